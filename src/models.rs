//! Models built from API payloads.
//!
//! The API's records are wide and change often, so models keep the payload
//! as JSON and expose fields by name. Field names follow the client's
//! [`KeyCasing`]. Use [`Model::deserialize`] to pull a payload into your own
//! typed struct.

use crate::client::{Client, Envelope};
use crate::error::{Error, Result};
use crate::params::Params;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

/// How model field names are spelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyCasing {
    /// `clan_chest_crowns`
    #[default]
    Snake,
    /// `clanChestCrowns`, as sent by the API
    Camel,
}

impl KeyCasing {
    /// Spell `key` in this casing.
    pub fn convert(self, key: &str) -> String {
        match self {
            KeyCasing::Snake => to_snake_case(key),
            KeyCasing::Camel => to_camel_case(key),
        }
    }
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev: Option<char> = None;
    for c in key.chars() {
        if c.is_uppercase() {
            if prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' && !out.is_empty() {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Upper bound on remembered key conversions per client.
const MAX_MEMOIZED_NAMES: usize = 4096;

/// Maps payload keys to the configured casing.
///
/// Keys whose converted form differs are remembered per client, up to
/// [`MAX_MEMOIZED_NAMES`]; unchanged keys and overflow are converted on the fly.
pub(crate) struct FieldMap {
    casing: KeyCasing,
    names: Mutex<HashMap<String, String>>,
}

impl FieldMap {
    pub(crate) fn new(casing: KeyCasing) -> Self {
        Self {
            casing,
            names: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn casing(&self) -> KeyCasing {
        self.casing
    }

    #[cfg(test)]
    fn memoized(&self) -> usize {
        self.names.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Copy of `value` with every object key renamed.
    pub(crate) fn apply(&self, value: &Value) -> Value {
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        self.rename(value, &mut names)
    }

    fn rename(&self, value: &Value, names: &mut HashMap<String, String>) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, v) in map {
                    let name = match names.get(key) {
                        Some(name) => name.clone(),
                        None => {
                            let name = self.casing.convert(key);
                            if name != *key && names.len() < MAX_MEMOIZED_NAMES {
                                names.insert(key.clone(), name.clone());
                            }
                            name
                        }
                    };
                    out.insert(name, self.rename(v, names));
                }
                Value::Object(out)
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.rename(v, names)).collect())
            }
            other => other.clone(),
        }
    }
}

/// The request a model was built from.
#[derive(Debug, Clone)]
pub(crate) struct Origin {
    pub(crate) path: String,
    pub(crate) params: Params,
}

/// A record returned by the API.
#[derive(Debug, Clone)]
pub struct Model {
    client: Client,
    raw: Value,
    fields: Value,
    cached: bool,
    timestamp: DateTime<Utc>,
    origin: Arc<Origin>,
}

impl Model {
    fn new(
        client: &Client,
        raw: Value,
        cached: bool,
        timestamp: DateTime<Utc>,
        origin: Arc<Origin>,
    ) -> Self {
        let fields = client.field_map().apply(&raw);
        Self {
            client: client.clone(),
            raw,
            fields,
            cached,
            timestamp,
            origin,
        }
    }

    /// Field by name, in the client's key casing.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String field by name.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Integer field by name.
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    /// The `tag` field.
    pub fn tag(&self) -> Option<&str> {
        self.get_str("tag")
    }

    /// The `name` field.
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    /// All fields, with keys in the client's casing.
    pub fn fields(&self) -> &Value {
        &self.fields
    }

    /// The payload exactly as the API sent it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Whether this record was served from the cache.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// When the payload was fetched from the API.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The client that produced this record.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Deserialize the raw payload into a caller-defined type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.raw).map_err(Error::Json)
    }

    /// Re-issue the request this record came from, bypassing the cache.
    pub async fn refresh_as<M: FromPayload>(&self) -> Result<Fetched<M>> {
        let params = self.origin.params.clone().refresh(true);
        self.client.get_model(&self.origin.path, params).await
    }
}

/// Types that can be built from a [`Model`].
pub trait FromPayload: Sized {
    /// Wrap a freshly built model.
    fn from_model(model: Model) -> Self;
}

impl FromPayload for Model {
    fn from_model(model: Model) -> Self {
        model
    }
}

macro_rules! model {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(Model);

        impl $name {
            /// Re-issue the request this record came from, bypassing the cache.
            pub async fn refresh(&self) -> Result<Fetched<Self>> {
                self.0.refresh_as().await
            }

            /// The underlying model.
            pub fn into_inner(self) -> Model {
                self.0
            }
        }

        impl FromPayload for $name {
            fn from_model(model: Model) -> Self {
                Self(model)
            }
        }

        impl Deref for $name {
            type Target = Model;

            fn deref(&self) -> &Model {
                &self.0
            }
        }
    };
}

model!(
    /// Full player profile.
    Player
);
model!(
    /// Player summary as it appears in rankings.
    PlayerInfo
);
model!(
    /// Full clan profile including members.
    Clan
);
model!(
    /// Clan summary as it appears in search results and rankings.
    ClanInfo
);
model!(
    /// Tournament details.
    Tournament
);
model!(
    /// Game constants: cards, arenas, chest cycles and so on.
    Constants
);
model!(
    /// Usage statistics for the current token.
    AuthStats
);

impl Player {
    /// Tag of the player's clan, if they are in one.
    pub fn clan_tag(&self) -> Option<&str> {
        self.get("clan")?.get("tag")?.as_str()
    }

    /// Fetch the player's clan.
    pub async fn get_clan(&self) -> Result<Option<Clan>> {
        let Some(tag) = self.clan_tag() else {
            return Ok(None);
        };
        self.client()
            .get_clan(&[tag], Params::new())
            .await?
            .into_one()
            .map(Some)
    }
}

impl Clan {
    /// Tags of all listed members.
    pub fn member_tags(&self) -> Vec<&str> {
        self.get("members")
            .and_then(Value::as_array)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|m| m.get("tag").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fetch the full profile of every member in one request.
    pub async fn get_members(&self) -> Result<Vec<Player>> {
        let tags = self.member_tags();
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        self.client()
            .get_players(&tags, Params::new())
            .await?
            .into_vec()
    }
}

/// A list of names (such as the endpoint listing) with its cache provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringList {
    items: Vec<String>,
    cached: bool,
    timestamp: DateTime<Utc>,
}

impl StringList {
    /// Whether the list was served from the cache.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// When the list was fetched from the API.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The names without their metadata.
    pub fn into_vec(self) -> Vec<String> {
        self.items
    }
}

impl Deref for StringList {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.items
    }
}

impl IntoIterator for StringList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a StringList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A converted payload.
///
/// Lookups by several tags return a list; lookups by one tag return a single
/// record. Plain-text and name-list endpoints have their own shapes.
#[derive(Debug, Clone)]
pub enum Fetched<M> {
    /// A bare string payload.
    Text(String),
    /// A list of strings.
    Names(StringList),
    /// A single record.
    One(M),
    /// Several records.
    Many(Vec<M>),
}

impl<M> Fetched<M> {
    /// The single record.
    pub fn into_one(self) -> Result<M> {
        match self {
            Fetched::One(m) => Ok(m),
            _ => Err(Error::UnexpectedPayload("a single record")),
        }
    }

    /// All records; a single record becomes a one-element list.
    pub fn into_vec(self) -> Result<Vec<M>> {
        match self {
            Fetched::One(m) => Ok(vec![m]),
            Fetched::Many(v) => Ok(v),
            _ => Err(Error::UnexpectedPayload("records")),
        }
    }

    /// The bare string payload.
    pub fn into_text(self) -> Result<String> {
        match self {
            Fetched::Text(s) => Ok(s),
            _ => Err(Error::UnexpectedPayload("a string")),
        }
    }

    /// The list of strings.
    pub fn into_names(self) -> Result<StringList> {
        match self {
            Fetched::Names(list) => Ok(list),
            _ => Err(Error::UnexpectedPayload("a list of strings")),
        }
    }
}

/// Turn an envelope into the shape its payload calls for.
pub(crate) fn convert<M: FromPayload>(
    client: &Client,
    envelope: Envelope,
    origin: Origin,
) -> Fetched<M> {
    let Envelope {
        data,
        cached,
        timestamp,
    } = envelope;
    let origin = Arc::new(origin);

    match data {
        Value::String(s) => Fetched::Text(s),
        Value::Array(items) if items.iter().all(Value::is_string) => Fetched::Names(StringList {
            items: items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            cached,
            timestamp,
        }),
        Value::Array(items) => Fetched::Many(
            items
                .into_iter()
                .map(|item| {
                    M::from_model(Model::new(client, item, cached, timestamp, origin.clone()))
                })
                .collect(),
        ),
        other => Fetched::One(M::from_model(Model::new(
            client, other, cached, timestamp, origin,
        ))),
    }
}
