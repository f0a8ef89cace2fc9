//! Cache backend trait and the cached value format.
//!
//! Keys are post UID strings (optionally prefixed). Values are JSON
//! documents holding the post's exported attributes, or a negative marker
//! for a UID that had no post when it was last fetched.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use grove_core::{EntityType, GroveError, GroveResult, Post, StorageError, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a cache slot holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "attributes", rename_all = "snake_case")]
pub enum CachedValue {
    /// Exported post attributes.
    Present(Value),
    /// The UID had no backing post.
    Absent,
}

/// A cache slot with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub cached_at: Timestamp,
    /// `None` means the entry lives until invalidated.
    pub expires_at: Option<Timestamp>,
}

fn expiry(now: Timestamp, ttl: Option<Duration>) -> Option<Timestamp> {
    let ttl = chrono::Duration::from_std(ttl?).ok()?;
    now.checked_add_signed(ttl)
}

fn serialization(reason: impl ToString) -> GroveError {
    GroveError::Storage(StorageError::Serialization {
        entity_type: EntityType::Post,
        reason: reason.to_string(),
    })
}

impl CacheEntry {
    /// Entry for a post that exists.
    pub fn present(post: &Post, ttl: Option<Duration>) -> Self {
        let now = Utc::now();
        Self {
            value: CachedValue::Present(Value::Object(post.attributes_for_export())),
            cached_at: now,
            expires_at: expiry(now, ttl),
        }
    }

    /// Negative marker for a UID with no post.
    pub fn absent(ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            value: CachedValue::Absent,
            cached_at: now,
            expires_at: expiry(now, Some(ttl)),
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Decode the cached post. `Ok(None)` for a negative marker.
    pub fn post(&self) -> GroveResult<Option<Post>> {
        match &self.value {
            CachedValue::Present(attributes) => serde_json::from_value(attributes.clone())
                .map(Some)
                .map_err(serialization),
            CachedValue::Absent => Ok(None),
        }
    }

    pub fn encode(&self) -> GroveResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(serialization)
    }

    pub fn decode(bytes: &[u8]) -> GroveResult<Self> {
        serde_json::from_slice(bytes).map_err(serialization)
    }
}

/// Cache backend trait for pluggable cache implementations.
///
/// Implementations must be safe for concurrent use. A refill race between
/// two readers is benign: last writer wins.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Look up many keys in one round trip.
    ///
    /// The result has the same length and order as `keys`.
    async fn get_many(&self, keys: &[String]) -> GroveResult<Vec<Option<CacheEntry>>>;

    /// Store an entry, replacing any previous one.
    async fn set(&self, key: &str, entry: &CacheEntry) -> GroveResult<()>;

    /// Remove an entry. Returns whether one existed.
    async fn delete(&self, key: &str) -> GroveResult<bool>;

    /// Remove every entry. Returns how many were removed.
    async fn clear(&self) -> GroveResult<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> GroveResult<CacheStats>;

    /// Entries outlive the process.
    fn is_persistent(&self) -> bool {
        false
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hits on a negative marker.
    pub negative_hits: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Approximate memory usage in bytes.
    pub memory_bytes: u64,
    /// Number of entries removed by invalidation.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0). Negative hits count as hits.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits + self.negative_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
