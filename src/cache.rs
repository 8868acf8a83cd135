//! Response cache keyed by request signature.

use crate::error::{Error, Result};
use crate::params::Params;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Url;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::warn;

/// Trait for cache implementations.
///
/// Stores are infallible from the client's point of view: a store that cannot
/// read or write should log and behave as if the entry were absent.
pub trait Cache: Send + Sync {
    /// Get a cached entry by key.
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store an entry in the cache, replacing any previous one.
    fn set(&self, key: &str, entry: CacheEntry);

    /// Delete an entry from the cache.
    fn delete(&self, key: &str);

    /// Whether an entry exists for the key, fresh or not.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// A cached payload and the moment it was captured.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The raw payload.
    pub data: Value,
    /// When the payload was fetched from the API.
    pub captured_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Entry captured now.
    pub fn new(data: Value) -> Self {
        Self {
            data,
            captured_at: Utc::now(),
        }
    }

    /// Whether the entry is younger than `ttl` at `now`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match (now - self.captured_at).to_std() {
            Ok(age) => age < ttl,
            // captured in the future: clock went backwards, treat as fresh
            Err(_) => true,
        }
    }
}

/// Canonical signature of a request: the endpoint URL plus its query
/// parameters in key order, form-urlencoded.
///
/// This is both the cache key and the URL sent on the wire.
pub fn signature(url: &str, params: &Params) -> Result<String> {
    let url = if params.is_empty() {
        Url::parse(url)
    } else {
        Url::parse_with_params(url, params.iter())
    }
    .map_err(|e| Error::Config(format!("invalid request URL {:?}: {}", url, e)))?;
    Ok(url.to_string())
}

/// In-memory cache with insertion-order eviction.
pub struct MemoryCache {
    store: RwLock<HashMap<String, CacheEntry>>,
    order: RwLock<VecDeque<String>>,
    max_entries: usize,
}

impl MemoryCache {
    /// Create a new memory cache with the given maximum entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: RwLock::new(HashMap::with_capacity(max_entries)),
            order: RwLock::new(VecDeque::with_capacity(max_entries)),
            max_entries: max_entries.max(1),
        }
    }

    /// Get the current number of entries.
    pub fn size(&self) -> usize {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let mut order = self.order.write().unwrap_or_else(PoisonError::into_inner);
        store.clear();
        order.clear();
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store.get(key).cloned()
    }

    fn set(&self, key: &str, entry: CacheEntry) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let mut order = self.order.write().unwrap_or_else(PoisonError::into_inner);

        if !store.contains_key(key) {
            while store.len() >= self.max_entries {
                match order.pop_front() {
                    Some(oldest) => {
                        store.remove(&oldest);
                    }
                    None => break,
                }
            }
            order.push_back(key.to_string());
        }

        store.insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let mut order = self.order.write().unwrap_or_else(PoisonError::into_inner);

        store.remove(key);
        order.retain(|k| k != key);
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Persistent cache stored in one table of a SQLite database.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteCache {
    /// Open (or create) the database at `path` and ensure `table` exists.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        Self::with_connection(Connection::open(path)?, table)
    }

    /// Cache backed by a private in-memory database.
    pub fn in_memory(table: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, table)
    }

    fn with_connection(conn: Connection, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                captured_at INTEGER NOT NULL
            )",
            table
        ))?;
        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        })
    }

    /// Name of the backing table.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn read(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let row: Option<(String, i64)> = conn
            .query_row(
                &format!(
                    "SELECT data, captured_at FROM \"{}\" WHERE key = ?1",
                    self.table
                ),
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((data, millis)) = row else {
            return Ok(None);
        };
        let Some(captured_at) = Utc.timestamp_millis_opt(millis).single() else {
            warn!(key = key, captured_at = millis, "Cached entry has an invalid timestamp");
            return Ok(None);
        };
        Ok(Some(CacheEntry {
            data: serde_json::from_str(&data)?,
            captured_at,
        }))
    }

    fn write(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let data = serde_json::to_string(&entry.data)?;
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO \"{}\" (key, data, captured_at) VALUES (?1, ?2, ?3)",
                self.table
            ),
            params![key, data, entry.captured_at.timestamp_millis()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            &format!("DELETE FROM \"{}\" WHERE key = ?1", self.table),
            params![key],
        )?;
        Ok(())
    }
}

impl Cache for SqliteCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.read(key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, key = key, "Cache read failed");
                None
            }
        }
    }

    fn set(&self, key: &str, entry: CacheEntry) {
        if let Err(e) = self.write(key, &entry) {
            warn!(error = %e, key = key, "Cache write failed");
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.remove(key) {
            warn!(error = %e, key = key, "Cache delete failed");
        }
    }
}

fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "cache table name {:?} must be letters, digits and underscores",
            table
        )))
    }
}
