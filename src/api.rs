//! Endpoint paths of the statistics API.

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.royaleapi.com";

pub const VERSION: &str = "/version";
pub const ENDPOINTS: &str = "/endpoints";
pub const TOURNAMENT: &str = "/tournaments";
pub const PLAYER: &str = "/player";
pub const CLAN: &str = "/clan";
pub const CLAN_SEARCH: &str = "/clan/search";
pub const CONSTANTS: &str = "/constants";
pub const TOP: &str = "/top";
pub const POPULAR: &str = "/popular";
pub const AUTH_STATS: &str = "/auth/stats";

/// `/top/{kind}` with an optional country key appended.
pub(crate) fn top(kind: &str, country_key: &str) -> String {
    let country_key = country_key.trim().trim_matches('/');
    if country_key.is_empty() {
        format!("{}/{}", TOP, kind)
    } else {
        format!("{}/{}/{}", TOP, kind, country_key)
    }
}
