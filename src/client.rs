//! Main client implementation.

use crate::api::{self, DEFAULT_BASE_URL};
use crate::blocking;
use crate::cache::{signature, Cache, CacheEntry, SqliteCache};
use crate::error::{parse_body, Error, Result};
use crate::models::*;
use crate::params::{join_tags, normalize_tag, validate_clan_search, Params, FIELD_KEYS};
use crate::version::{build_user_agent, token_fingerprint};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_EXPIRES_SECS: u64 = 300;
const DEFAULT_TABLE_NAME: &str = "cache";

/// Environment variable read by [`ClientBuilder::from_env`] for the token.
pub const TOKEN_ENV: &str = "CLASHROYALE_TOKEN";
/// Environment variable read by [`ClientBuilder::from_env`] for the base URL.
pub const BASE_URL_ENV: &str = "CLASHROYALE_BASE_URL";

/// Builder for constructing a [`Client`] or a [`blocking::Client`].
pub struct ClientBuilder {
    token: String,
    base_url: String,
    timeout: Duration,
    http_client: Option<reqwest::Client>,
    cache: Option<Arc<dyn Cache>>,
    cache_path: Option<PathBuf>,
    table_name: String,
    cache_expires: Duration,
    key_casing: KeyCasing,
    user_agent_suffix: Option<String>,
}

impl ClientBuilder {
    /// Create a new client builder with the given API token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            http_client: None,
            cache: None,
            cache_path: None,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            cache_expires: Duration::from_secs(DEFAULT_CACHE_EXPIRES_SECS),
            key_casing: KeyCasing::default(),
            user_agent_suffix: None,
        }
    }

    /// Builder configured from `CLASHROYALE_TOKEN` and, if set,
    /// `CLASHROYALE_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .map_err(|_| Error::Config(format!("{} is not set", TOKEN_ENV)))?;
        let mut builder = Self::new(token);
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            builder = builder.base_url(url);
        }
        Ok(builder)
    }

    /// Set the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use an existing HTTP client instead of creating one.
    ///
    /// The configured timeout is still applied to every request.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Cache responses in the SQLite database at `path`.
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Table used inside the cache database.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// How long a cached response is served before the API is asked again.
    pub fn cache_expires(mut self, expires: Duration) -> Self {
        self.cache_expires = expires;
        self
    }

    /// Cache responses in a custom store. Takes precedence over
    /// [`cache_path`](Self::cache_path).
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Spelling of model field names.
    pub fn key_casing(mut self, casing: KeyCasing) -> Self {
        self.key_casing = casing;
        self
    }

    /// Set a custom User-Agent suffix.
    pub fn user_agent_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.user_agent_suffix = Some(suffix.into());
        self
    }

    /// Build an async client.
    pub fn build(self) -> Result<Client> {
        if self.token.is_empty() {
            return Err(Error::Config("API token is required".into()));
        }

        if !self.base_url.starts_with("https://") {
            warn!(
                base_url = %self.base_url,
                "API base URL is not using HTTPS. This is insecure."
            );
        }

        let user_agent = build_user_agent(self.user_agent_suffix.as_deref());
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|_| Error::Config("API token contains invalid characters".into()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent)
                .map_err(|_| Error::Config("User-Agent contains invalid characters".into()))?,
        );

        let http = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(Error::Http)?,
        };

        let cache: Option<Arc<dyn Cache>> = match (self.cache, self.cache_path) {
            (Some(cache), _) => Some(cache),
            (None, Some(path)) => Some(Arc::new(SqliteCache::open(path, &self.table_name)?)),
            (None, None) => None,
        };

        let fingerprint = token_fingerprint(&self.token);
        debug!(
            token = %fingerprint,
            base_url = %self.base_url,
            caching = cache.is_some(),
            "Client created"
        );

        Ok(Client {
            inner: Arc::new(Inner {
                base_url: self.base_url,
                headers,
                timeout: self.timeout,
                caching: cache.is_some(),
                cache_expires: self.cache_expires,
                fields: FieldMap::new(self.key_casing),
                fingerprint,
                session: RwLock::new(Some(Session { http, cache })),
            }),
        })
    }

    /// Build a blocking client.
    ///
    /// Must not be called from within an async runtime.
    pub fn build_blocking(self) -> Result<blocking::Client> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to start runtime: {}", e)))?;
        Ok(blocking::Client::new(self.build()?, runtime))
    }
}

/// A payload together with where and when it was obtained.
#[derive(Debug, Clone)]
pub(crate) struct Envelope {
    pub(crate) data: Value,
    pub(crate) cached: bool,
    pub(crate) timestamp: DateTime<Utc>,
}

/// Handles released by [`Client::close`].
#[derive(Clone)]
struct Session {
    http: reqwest::Client,
    cache: Option<Arc<dyn Cache>>,
}

struct Inner {
    base_url: String,
    headers: HeaderMap,
    timeout: Duration,
    caching: bool,
    cache_expires: Duration,
    fields: FieldMap,
    fingerprint: String,
    session: RwLock<Option<Session>>,
}

/// Async client for the Clash Royale statistics API.
///
/// Cloning is cheap; clones share the HTTP session and the cache.
///
/// # Example
///
/// ```rust,no_run
/// use clashroyale::{Client, Params};
///
/// #[tokio::main]
/// async fn main() -> Result<(), clashroyale::Error> {
///     let client = Client::builder("your-token")
///         .cache_path("cr-cache.sqlite")
///         .build()?;
///
///     let clan = client.get_clan(&["#2CCCP"], Params::new()).await?.into_one()?;
///     println!("{:?} ({} members)", clan.name(), clan.member_tags().len());
///
///     client.close();
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("token", &self.inner.fingerprint)
            .field("caching", &self.inner.caching)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client builder.
    pub fn builder(token: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(token)
    }

    /// Release the HTTP session and the cache handle. Further requests,
    /// from this client, its clones and the models it produced, fail with
    /// [`Error::Closed`].
    ///
    /// Closing twice is harmless. Requests already in flight finish with the
    /// handles they started with.
    pub fn close(&self) {
        let session = self
            .inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if session.is_some() {
            debug!(token = %self.inner.fingerprint, "Client closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.session().is_none()
    }

    /// Whether responses are cached.
    pub fn is_caching(&self) -> bool {
        self.inner.caching
    }

    fn session(&self) -> Option<Session> {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Spelling of model field names.
    pub fn key_casing(&self) -> KeyCasing {
        self.inner.fields.casing()
    }

    pub(crate) fn field_map(&self) -> &FieldMap {
        &self.inner.fields
    }

    /// API version string.
    pub async fn get_version(&self) -> Result<String> {
        self.get_model::<Model>(api::VERSION, Params::new())
            .await?
            .into_text()
    }

    /// Paths of all available endpoints.
    pub async fn get_endpoints(&self) -> Result<StringList> {
        self.get_model::<Model>(api::ENDPOINTS, Params::new())
            .await?
            .into_names()
    }

    /// Tournament by tag.
    pub async fn get_tournament(&self, tag: &str, params: Params) -> Result<Fetched<Tournament>> {
        let tag = normalize_tag(tag)?;
        params.ensure_allowed(FIELD_KEYS)?;
        self.get_model(&format!("{}/{}", api::TOURNAMENT, tag), params)
            .await
    }

    /// One player, or several when more than one tag is given.
    pub async fn get_player<S: AsRef<str>>(
        &self,
        tags: &[S],
        params: Params,
    ) -> Result<Fetched<Player>> {
        let tags = join_tags(tags)?;
        params.ensure_allowed(FIELD_KEYS)?;
        self.get_model(&format!("{}/{}", api::PLAYER, tags), params)
            .await
    }

    /// Alias of [`get_player`](Self::get_player).
    pub async fn get_players<S: AsRef<str>>(
        &self,
        tags: &[S],
        params: Params,
    ) -> Result<Fetched<Player>> {
        self.get_player(tags, params).await
    }

    /// One clan, or several when more than one tag is given.
    pub async fn get_clan<S: AsRef<str>>(
        &self,
        tags: &[S],
        params: Params,
    ) -> Result<Fetched<Clan>> {
        let tags = join_tags(tags)?;
        params.ensure_allowed(FIELD_KEYS)?;
        self.get_model(&format!("{}/{}", api::CLAN, tags), params)
            .await
    }

    /// Alias of [`get_clan`](Self::get_clan).
    pub async fn get_clans<S: AsRef<str>>(
        &self,
        tags: &[S],
        params: Params,
    ) -> Result<Fetched<Clan>> {
        self.get_clan(tags, params).await
    }

    /// Search clans by `name`, `score`, `minMembers`, `maxMembers` or
    /// `locationId`.
    pub async fn search_clans(&self, params: Params) -> Result<Fetched<ClanInfo>> {
        validate_clan_search(&params)?;
        self.get_model(api::CLAN_SEARCH, params).await
    }

    /// Game constants.
    pub async fn get_constants(&self, params: Params) -> Result<Fetched<Constants>> {
        params.ensure_allowed(FIELD_KEYS)?;
        self.get_model(api::CONSTANTS, params).await
    }

    /// Top clans, globally or for a country key such as `"US"`.
    pub async fn get_top_clans(
        &self,
        country_key: &str,
        params: Params,
    ) -> Result<Fetched<ClanInfo>> {
        params.ensure_allowed(FIELD_KEYS)?;
        self.get_model(&api::top("clans", country_key), params)
            .await
    }

    /// Top players, globally or for a country key such as `"US"`.
    pub async fn get_top_players(
        &self,
        country_key: &str,
        params: Params,
    ) -> Result<Fetched<PlayerInfo>> {
        params.ensure_allowed(FIELD_KEYS)?;
        self.get_model(&api::top("players", country_key), params)
            .await
    }

    /// Most looked-up clans.
    pub async fn get_popular_clans(&self, params: Params) -> Result<Fetched<Clan>> {
        params.ensure_allowed(FIELD_KEYS)?;
        self.get_model(&format!("{}/clans", api::POPULAR), params)
            .await
    }

    /// Most looked-up players.
    pub async fn get_popular_players(&self, params: Params) -> Result<Fetched<PlayerInfo>> {
        params.ensure_allowed(FIELD_KEYS)?;
        self.get_model(&format!("{}/players", api::POPULAR), params)
            .await
    }

    /// Most looked-up tournaments.
    pub async fn get_popular_tournaments(&self, params: Params) -> Result<Fetched<Tournament>> {
        params.ensure_allowed(FIELD_KEYS)?;
        self.get_model(&format!("{}/tournaments", api::POPULAR), params)
            .await
    }

    /// Usage statistics for the current token.
    pub async fn get_auth_stats(&self, params: Params) -> Result<Fetched<AuthStats>> {
        params.ensure_allowed(FIELD_KEYS)?;
        self.get_model(api::AUTH_STATS, params).await
    }

    // === Internal methods ===

    /// Fetch `path` and convert the payload, falling back to a fresh cached
    /// payload if the request fails.
    pub(crate) async fn get_model<M: FromPayload>(
        &self,
        path: &str,
        params: Params,
    ) -> Result<Fetched<M>> {
        let session = self.session().ok_or(Error::Closed)?;

        let url = signature(&format!("{}{}", self.inner.base_url, path), &params)?;

        let envelope = match self.request(&session, &url, params.is_refresh()).await {
            Ok(envelope) => envelope,
            Err(e) => match self.resolve_cache(&session, &url) {
                Some(envelope) => {
                    warn!(error = %e, url = %url, "Request failed. Serving cached response");
                    envelope
                }
                None => return Err(e),
            },
        };

        let origin = Origin {
            path: path.to_string(),
            params,
        };
        Ok(convert(self, envelope, origin))
    }

    async fn request(&self, session: &Session, url: &str, refresh: bool) -> Result<Envelope> {
        if !refresh {
            if let Some(envelope) = self.resolve_cache(session, url) {
                return Ok(envelope);
            }
        }
        self.fetch(session, url).await
    }

    /// Fresh cache entry for `url`, if caching is enabled and one exists.
    fn resolve_cache(&self, session: &Session, url: &str) -> Option<Envelope> {
        let cache = session.cache.as_ref()?;
        let entry = cache.get(url)?;
        if !entry.is_fresh(self.inner.cache_expires, Utc::now()) {
            debug!(url = url, captured_at = %entry.captured_at, "Cached response expired");
            return None;
        }

        debug!(url = url, captured_at = %entry.captured_at, "Cache hit");
        Some(Envelope {
            data: entry.data,
            cached: true,
            timestamp: entry.captured_at,
        })
    }

    async fn fetch(&self, session: &Session, url: &str) -> Result<Envelope> {
        let response = session
            .http
            .get(url)
            .headers(self.inner.headers.clone())
            .timeout(self.inner.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport_error)?;
        debug!(url = url, status = status, "Received response");

        let data = Error::check_status(status, url, parse_body(&text))?;
        let timestamp = Utc::now();

        if let Some(cache) = &session.cache {
            cache.set(
                url,
                CacheEntry {
                    data: data.clone(),
                    captured_at: timestamp,
                },
            );
        }

        Ok(Envelope {
            data,
            cached: false,
            timestamp,
        })
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::NotResponding
    } else {
        Error::Http(e)
    }
}
