//! Last-known-good snapshots of server responses.
//!
//! Reads prefer a live fetch and fall back to the most recent snapshot.
//! A transport failure is never surfaced when a snapshot exists.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::db::{DbError, DbResult, SharedDatabase};
use crate::remote::TransportResult;

/// Snapshot key for the full patient list.
pub const PATIENTS_LIST_KEY: &str = "patients-list";

/// Snapshot key for dashboard stats.
pub const STATS_KEY: &str = "stats";

/// A cached value and when it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub value: T,
    pub fetched_at: String,
}

/// Result of a cache-backed read.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedRead<T> {
    /// Live data, already written to the cache
    Fresh(T),
    /// Live fetch skipped or failed; last snapshot
    Cached(Snapshot<T>),
    /// Nothing live and nothing cached
    NoData,
}

impl<T> CachedRead<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            CachedRead::Fresh(value) => Some(value),
            CachedRead::Cached(snapshot) => Some(&snapshot.value),
            CachedRead::NoData => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            CachedRead::Fresh(value) => Some(value),
            CachedRead::Cached(snapshot) => Some(snapshot.value),
            CachedRead::NoData => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, CachedRead::Fresh(_))
    }
}

/// Snapshot store plus the read policy.
#[derive(Clone)]
pub struct CacheLayer {
    db: SharedDatabase,
    connectivity: Arc<ConnectivityMonitor>,
}

impl CacheLayer {
    pub fn new(db: SharedDatabase, connectivity: Arc<ConnectivityMonitor>) -> Self {
        Self { db, connectivity }
    }

    /// Most recent snapshot for `key`.
    ///
    /// A snapshot that no longer deserializes (e.g. written by an older
    /// build) counts as a miss.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<Snapshot<T>>> {
        let row = {
            let db = self.db.lock()?;
            db.get_snapshot(key).map_err(DbError::into_unavailable)?
        };

        let Some(row) = row else {
            return Ok(None);
        };

        match serde_json::from_str(&row.payload) {
            Ok(value) => Ok(Some(Snapshot {
                value,
                fetched_at: row.fetched_at,
            })),
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable snapshot");
                Ok(None)
            }
        }
    }

    /// Overwrite the snapshot for `key`.
    pub fn write<T: Serialize>(&self, key: &str, value: &T) -> DbResult<()> {
        let payload = serde_json::to_string(value)?;
        let fetched_at = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock()?;
        db.put_snapshot(key, &payload, &fetched_at)
            .map_err(DbError::into_unavailable)
    }

    /// Forget the snapshot for `key`.
    pub fn invalidate(&self, key: &str) -> DbResult<bool> {
        let db = self.db.lock()?;
        db.delete_snapshot(key).map_err(DbError::into_unavailable)
    }

    /// Live fetch with snapshot fallback.
    ///
    /// Offline: snapshot or `NoData`, `live` is not called. Online: `live`
    /// runs; success refreshes the snapshot, failure falls back to it.
    pub fn fetch_or_cached<T, F>(&self, key: &str, live: F) -> DbResult<CachedRead<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> TransportResult<T>,
    {
        if !self.connectivity.is_online() {
            debug!(key, "offline, serving snapshot");
            return self.fallback(key);
        }

        match live() {
            Ok(value) => {
                if let Err(e) = self.write(key, &value) {
                    // Fresh data is still good even if it could not be kept.
                    warn!(key, error = %e, "failed to store snapshot");
                }
                Ok(CachedRead::Fresh(value))
            }
            Err(e) => {
                warn!(key, error = %e, "live fetch failed, serving snapshot");
                self.fallback(key)
            }
        }
    }

    fn fallback<T: DeserializeOwned>(&self, key: &str) -> DbResult<CachedRead<T>> {
        Ok(match self.read(key)? {
            Some(snapshot) => CachedRead::Cached(snapshot),
            None => CachedRead::NoData,
        })
    }
}
