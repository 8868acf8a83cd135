//! Query parameters and argument validation.
//!
//! Everything here runs before any network access, so a malformed tag or a
//! disallowed parameter never costs a request.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Characters the game uses in player, clan and tournament tags.
const TAG_ALPHABET: &str = "0289PYLQGRJCUV";

/// Query keys accepted by the lookup, listing and constants endpoints.
pub(crate) const FIELD_KEYS: &[&str] = &["keys", "exclude", "max"];

/// Query keys accepted by clan search.
pub(crate) const CLAN_SEARCH_KEYS: &[&str] = &[
    "name",
    "score",
    "minMembers",
    "maxMembers",
    "locationId",
    "max",
];

/// Query parameters for a single request.
///
/// Keys are kept sorted so the same logical request always produces the same
/// cache signature.
///
/// ```
/// use clashroyale::Params;
///
/// let params = Params::new().keys(["name", "trophies"]).max(10).refresh(true);
/// assert_eq!(params.get("keys"), Some("name,trophies"));
/// assert!(params.is_refresh());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    query: BTreeMap<String, String>,
    refresh: bool,
}

impl Params {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only return these fields.
    pub fn keys<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.field_list("keys", keys)
    }

    /// Leave these fields out of the response.
    pub fn exclude<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.field_list("exclude", keys)
    }

    // an empty list would send `key=`, which the API reads as "no fields"
    fn field_list<I, S>(self, key: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match join(keys) {
            joined if joined.is_empty() => self,
            joined => self.param(key, joined),
        }
    }

    /// Limit the number of returned records.
    pub fn max(self, max: u32) -> Self {
        self.param("max", max.to_string())
    }

    /// Set an arbitrary query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Skip the initial cache lookup. Fresh responses are still written to the
    /// cache, and the cache is still used as a fallback when the request fails.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Whether the initial cache lookup is skipped.
    pub fn is_refresh(&self) -> bool {
        self.refresh
    }

    /// Value of a query parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Whether no query parameters are set.
    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }

    /// Query parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reject any key outside `allowed`.
    pub(crate) fn ensure_allowed(&self, allowed: &[&str]) -> Result<()> {
        match self.query.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(key) => Err(Error::InvalidParam(format!(
                "{:?} is not accepted here (allowed: {})",
                key,
                allowed.join(", ")
            ))),
            None => Ok(()),
        }
    }
}

fn join<I, S>(keys: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter()
        .map(|k| k.as_ref().trim().to_string())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Normalize a player, clan or tournament tag.
///
/// Strips whitespace and a leading `#`, uppercases, and maps the letter `O`
/// to the digit `0`.
///
/// ```
/// assert_eq!(clashroyale::normalize_tag("#2ppo").unwrap(), "2PP0");
/// assert!(clashroyale::normalize_tag("#ab").is_err());
/// ```
pub fn normalize_tag(tag: &str) -> Result<String> {
    let normalized = tag
        .trim()
        .trim_start_matches('#')
        .to_uppercase()
        .replace('O', "0");

    if normalized.len() < 3 {
        return Err(Error::InvalidTag {
            tag: tag.to_string(),
            reason: "tags are at least 3 characters long".into(),
        });
    }

    if let Some(c) = normalized.chars().find(|c| !TAG_ALPHABET.contains(*c)) {
        return Err(Error::InvalidTag {
            tag: tag.to_string(),
            reason: format!("{:?} is not a valid tag character", c),
        });
    }

    Ok(normalized)
}

/// Normalize a list of tags into the comma-joined form used in paths.
pub(crate) fn join_tags<S: AsRef<str>>(tags: &[S]) -> Result<String> {
    if tags.is_empty() {
        return Err(Error::InvalidParam("at least one tag is required".into()));
    }
    let tags = tags
        .iter()
        .map(|t| normalize_tag(t.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(tags.join(","))
}

/// Validate clan search parameters.
pub(crate) fn validate_clan_search(params: &Params) -> Result<()> {
    params.ensure_allowed(CLAN_SEARCH_KEYS)?;

    if params.iter().all(|(k, _)| k == "max") {
        return Err(Error::InvalidParam(
            "clan search needs at least one of name, score, minMembers, maxMembers, locationId"
                .into(),
        ));
    }

    if let Some(name) = params.get("name") {
        if name.trim().chars().count() < 3 {
            return Err(Error::InvalidParam(
                "clan search name must be at least 3 characters".into(),
            ));
        }
    }

    for key in ["score", "minMembers", "maxMembers", "locationId", "max"] {
        if let Some(value) = params.get(key) {
            if value.parse::<u64>().is_err() {
                return Err(Error::InvalidParam(format!(
                    "{} must be a non-negative integer, got {:?}",
                    key, value
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("#2PP").unwrap(), "2PP");
        assert_eq!(normalize_tag("  #9yj2ruv  ").unwrap(), "9YJ2RUV");
        assert_eq!(normalize_tag("qoo").unwrap(), "Q00");

        assert!(matches!(normalize_tag("#AB"), Err(Error::InvalidTag { .. })));
        assert!(matches!(normalize_tag("ABCDEF"), Err(Error::InvalidTag { .. })));
        assert!(normalize_tag("").is_err());
    }

    #[test]
    fn test_join_tags() {
        assert_eq!(join_tags(&["#2PP", "9yj"]).unwrap(), "2PP,9YJ");
        assert!(join_tags::<&str>(&[]).is_err());
        assert!(join_tags(&["2PP", "bad!"]).is_err());
    }

    #[test]
    fn test_params_builder() {
        let params = Params::new()
            .keys(["name", " tag ", ""])
            .exclude(vec!["members".to_string()])
            .max(5);

        assert_eq!(params.get("keys"), Some("name,tag"));
        assert_eq!(params.get("exclude"), Some("members"));
        assert_eq!(params.get("max"), Some("5"));
        assert!(!params.is_refresh());

        let keys: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["exclude", "keys", "max"]);
    }

    #[test]
    fn test_empty_field_lists_are_not_sent() {
        let params = Params::new()
            .keys(Vec::<&str>::new())
            .exclude(["", "  "]);
        assert!(params.is_empty());
        assert_eq!(params.get("keys"), None);
        assert_eq!(params.get("exclude"), None);

        let sig = crate::cache::signature("https://x.test/clan/2PP", &params).unwrap();
        assert_eq!(sig, "https://x.test/clan/2PP");
    }

    #[test]
    fn test_refresh_is_not_a_query_param() {
        let params = Params::new().refresh(true);
        assert!(params.is_empty());
        assert!(params.is_refresh());
    }

    #[test]
    fn test_ensure_allowed() {
        assert!(Params::new().keys(["name"]).ensure_allowed(FIELD_KEYS).is_ok());
        assert!(matches!(
            Params::new().param("limit", "3").ensure_allowed(FIELD_KEYS),
            Err(Error::InvalidParam(_))
        ));
    }

    #[test]
    fn test_validate_clan_search() {
        assert!(validate_clan_search(&Params::new().param("name", "Reddit")).is_ok());
        assert!(validate_clan_search(
            &Params::new().param("minMembers", "40").param("locationId", "57000000")
        )
        .is_ok());

        assert!(validate_clan_search(&Params::new()).is_err());
        assert!(validate_clan_search(&Params::new().max(10)).is_err());
        assert!(validate_clan_search(&Params::new().param("name", "ab")).is_err());
        assert!(validate_clan_search(&Params::new().param("score", "lots")).is_err());
        assert!(validate_clan_search(&Params::new().param("keys", "name")).is_err());
    }
}
