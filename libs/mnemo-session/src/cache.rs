//! Local session cache with TTL and bounded capacity.
//!
//! One explicit cache instance per session manager, constructed with its
//! capacity and TTL; there is no ambient shared cache. Entries expire after
//! the TTL and eviction is oldest-first when the entry cap is hit. A write
//! that trips the underlying store's quota evicts the oldest entry and
//! retries once before giving up.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::{StorageBackend, StorageError};

/// Cache tuning; smaller caps suit constrained clients.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(24),
            max_entries: 50,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    stored_at: DateTime<Utc>,
    payload: String,
}

/// Insertion-ordered key index, oldest first.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    keys: Vec<String>,
}

const INDEX_KEY: &str = "__mnemo_cache_index";

/// TTL + capacity cache over one selected storage backend.
pub struct SessionCache {
    backend: Box<dyn StorageBackend>,
    config: CacheConfig,
}

impl SessionCache {
    pub fn new(backend: Box<dyn StorageBackend>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    /// Store a value, evicting oldest entries past the cap or on quota
    /// pressure.
    pub fn put<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let payload =
            serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let entry = CacheEntry {
            stored_at: now,
            payload,
        };
        let encoded =
            serde_json::to_string(&entry).map_err(|e| StorageError::Serialization(e.to_string()))?;

        if let Err(err) = self.backend.set(key, &encoded) {
            match err {
                StorageError::QuotaExceeded(_) => {
                    warn!(key, "cache write hit quota, evicting oldest entry");
                    self.evict_oldest()?;
                    self.backend.set(key, &encoded)?;
                }
                other => return Err(other),
            }
        }

        let mut index = self.load_index();
        index.keys.retain(|k| k != key);
        index.keys.push(key.to_string());
        while index.keys.len() > self.config.max_entries {
            let oldest = index.keys.remove(0);
            debug!(key = %oldest, "cache at capacity, evicting oldest entry");
            self.backend.remove(&oldest)?;
        }
        self.store_index(&index)
    }

    /// Read a value back, dropping it when the TTL has passed.
    pub fn get<T: DeserializeOwned>(
        &mut self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<T>, StorageError> {
        let Some(encoded) = self.backend.get(key)? else {
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_str(&encoded)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        if now.signed_duration_since(entry.stored_at) > self.config.ttl {
            debug!(key, "cache entry expired");
            self.remove(key)?;
            return Ok(None);
        }
        serde_json::from_str(&entry.payload)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.backend.remove(key)?;
        let mut index = self.load_index();
        index.keys.retain(|k| k != key);
        self.store_index(&index)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.backend.clear()
    }

    fn evict_oldest(&mut self) -> Result<(), StorageError> {
        let mut index = self.load_index();
        if index.keys.is_empty() {
            return Err(StorageError::QuotaExceeded(
                "store is full and the cache has nothing left to evict".to_string(),
            ));
        }
        let oldest = index.keys.remove(0);
        self.backend.remove(&oldest)?;
        self.store_index(&index)
    }

    /// A corrupt or missing index degrades to empty rather than failing
    /// the session.
    fn load_index(&self) -> CacheIndex {
        match self.backend.get(INDEX_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            _ => CacheIndex::default(),
        }
    }

    fn store_index(&mut self, index: &CacheIndex) -> Result<(), StorageError> {
        let raw = serde_json::to_string(index)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.backend.set(INDEX_KEY, &raw)
    }
}
