//! Blocking client.
//!
//! [`Client`] runs the same request pipeline as the async [`crate::Client`],
//! driving each call to completion on a private single-threaded runtime
//! before returning. It must be created and used outside of any async
//! runtime; calling it from async code panics.
//!
//! ```rust,no_run
//! use clashroyale::{ClientBuilder, Params};
//!
//! fn main() -> Result<(), clashroyale::Error> {
//!     let client = ClientBuilder::new("your-token").build_blocking()?;
//!     let player = client.get_player(&["#2PP"], Params::new())?.into_one()?;
//!     println!("{:?}", player.name());
//!     Ok(())
//! }
//! ```

use crate::client::ClientBuilder;
use crate::error::Result;
use crate::models::*;
use crate::params::Params;
use std::fmt;
use std::future::Future;
use tokio::runtime::Runtime;

/// Blocking client for the Clash Royale statistics API.
pub struct Client {
    inner: crate::Client,
    runtime: Runtime,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("blocking::Client")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub(crate) fn new(inner: crate::Client, runtime: Runtime) -> Self {
        Self { inner, runtime }
    }

    /// Create a new client builder; finish it with
    /// [`ClientBuilder::build_blocking`].
    pub fn builder(token: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(token)
    }

    /// Run a future on this client's runtime, for follow-up calls made
    /// through a model such as [`Player::get_clan`].
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// The async client this one drives.
    pub fn as_async(&self) -> &crate::Client {
        &self.inner
    }

    /// Release the client. Further requests fail with
    /// [`Error::Closed`](crate::Error::Closed). Closing twice is harmless.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Re-issue the request `model` came from, bypassing the cache.
    pub fn refresh<M: FromPayload>(&self, model: &Model) -> Result<Fetched<M>> {
        self.block_on(model.refresh_as())
    }

    /// API version string.
    pub fn get_version(&self) -> Result<String> {
        self.block_on(self.inner.get_version())
    }

    /// Paths of all available endpoints.
    pub fn get_endpoints(&self) -> Result<StringList> {
        self.block_on(self.inner.get_endpoints())
    }

    /// Tournament by tag.
    pub fn get_tournament(&self, tag: &str, params: Params) -> Result<Fetched<Tournament>> {
        self.block_on(self.inner.get_tournament(tag, params))
    }

    /// One player, or several when more than one tag is given.
    pub fn get_player<S: AsRef<str>>(&self, tags: &[S], params: Params) -> Result<Fetched<Player>> {
        self.block_on(self.inner.get_player(tags, params))
    }

    /// Alias of [`get_player`](Self::get_player).
    pub fn get_players<S: AsRef<str>>(
        &self,
        tags: &[S],
        params: Params,
    ) -> Result<Fetched<Player>> {
        self.get_player(tags, params)
    }

    /// One clan, or several when more than one tag is given.
    pub fn get_clan<S: AsRef<str>>(&self, tags: &[S], params: Params) -> Result<Fetched<Clan>> {
        self.block_on(self.inner.get_clan(tags, params))
    }

    /// Alias of [`get_clan`](Self::get_clan).
    pub fn get_clans<S: AsRef<str>>(&self, tags: &[S], params: Params) -> Result<Fetched<Clan>> {
        self.get_clan(tags, params)
    }

    /// Search clans.
    pub fn search_clans(&self, params: Params) -> Result<Fetched<ClanInfo>> {
        self.block_on(self.inner.search_clans(params))
    }

    /// Game constants.
    pub fn get_constants(&self, params: Params) -> Result<Fetched<Constants>> {
        self.block_on(self.inner.get_constants(params))
    }

    /// Top clans, globally or for a country key.
    pub fn get_top_clans(&self, country_key: &str, params: Params) -> Result<Fetched<ClanInfo>> {
        self.block_on(self.inner.get_top_clans(country_key, params))
    }

    /// Top players, globally or for a country key.
    pub fn get_top_players(
        &self,
        country_key: &str,
        params: Params,
    ) -> Result<Fetched<PlayerInfo>> {
        self.block_on(self.inner.get_top_players(country_key, params))
    }

    /// Most looked-up clans.
    pub fn get_popular_clans(&self, params: Params) -> Result<Fetched<Clan>> {
        self.block_on(self.inner.get_popular_clans(params))
    }

    /// Most looked-up players.
    pub fn get_popular_players(&self, params: Params) -> Result<Fetched<PlayerInfo>> {
        self.block_on(self.inner.get_popular_players(params))
    }

    /// Most looked-up tournaments.
    pub fn get_popular_tournaments(&self, params: Params) -> Result<Fetched<Tournament>> {
        self.block_on(self.inner.get_popular_tournaments(params))
    }

    /// Usage statistics for the current token.
    pub fn get_auth_stats(&self, params: Params) -> Result<Fetched<AuthStats>> {
        self.block_on(self.inner.get_auth_stats(params))
    }
}
