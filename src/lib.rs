//! Rust client for the Clash Royale statistics API.
//!
//! Every endpoint is available from an async [`Client`] and from a
//! [`blocking::Client`]; both run the same request pipeline. Responses can
//! be cached in a SQLite database (or any [`Cache`]) so repeated lookups
//! within the expiry window skip the network, and so a failed request can
//! still be answered from a recent cached copy.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use clashroyale::{Client, Params};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), clashroyale::Error> {
//!     let client = Client::builder("your-token")
//!         .cache_path("cr-cache.sqlite")
//!         .cache_expires(Duration::from_secs(300))
//!         .build()?;
//!
//!     let player = client
//!         .get_player(&["#2PP"], Params::new().exclude(["cards"]))
//!         .await?
//!         .into_one()?;
//!
//!     println!("{:?} has {:?} trophies", player.name(), player.get_i64("trophies"));
//!     Ok(())
//! }
//! ```

mod api;
pub mod blocking;
mod cache;
mod client;
mod error;
mod models;
mod params;
mod version;

pub use api::DEFAULT_BASE_URL;
pub use cache::{signature, Cache, CacheEntry, MemoryCache, SqliteCache};
pub use client::{Client, ClientBuilder, BASE_URL_ENV, TOKEN_ENV};
pub use error::{Error, Result};
pub use models::{
    AuthStats, Clan, ClanInfo, Constants, Fetched, FromPayload, KeyCasing, Model, Player,
    PlayerInfo, StringList, Tournament,
};
pub use params::{normalize_tag, Params};
pub use version::{build_user_agent, SDK_VERSION};
