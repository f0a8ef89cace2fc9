//! Process-local cache backend.
//!
//! Entries are held encoded, the same bytes a networked cache would store,
//! so decode failures surface here exactly as they would in production.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use grove_core::{GroveError, GroveResult, StorageError};

use super::traits::{CacheBackend, CacheEntry, CacheStats};

/// In-memory cache backend.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCacheBackend {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `key` currently has an entry.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    /// Write raw bytes under `key`, bypassing encoding.
    pub fn insert_raw(&self, key: &str, bytes: Vec<u8>) -> GroveResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| GroveError::Storage(StorageError::LockPoisoned))?;
        entries.insert(key.to_string(), bytes);
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get_many(&self, keys: &[String]) -> GroveResult<Vec<Option<CacheEntry>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| GroveError::Storage(StorageError::LockPoisoned))?;
        keys.iter()
            .map(|key| {
                entries
                    .get(key)
                    .map(|bytes| CacheEntry::decode(bytes))
                    .transpose()
            })
            .collect()
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> GroveResult<()> {
        let bytes = entry.encode()?;
        self.insert_raw(key, bytes)
    }

    async fn delete(&self, key: &str) -> GroveResult<bool> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| GroveError::Storage(StorageError::LockPoisoned))?;
        Ok(entries.remove(key).is_some())
    }

    async fn clear(&self) -> GroveResult<u64> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| GroveError::Storage(StorageError::LockPoisoned))?;
        let count = entries.len() as u64;
        entries.clear();
        Ok(count)
    }

    async fn stats(&self) -> GroveResult<CacheStats> {
        let entries = self
            .entries
            .read()
            .map_err(|_| GroveError::Storage(StorageError::LockPoisoned))?;
        Ok(CacheStats {
            entry_count: entries.len() as u64,
            memory_bytes: entries
                .iter()
                .map(|(key, value)| (key.len() + value.len()) as u64)
                .sum(),
            ..Default::default()
        })
    }
}
