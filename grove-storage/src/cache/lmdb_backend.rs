//! LMDB-backed cache implementation.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped
//! key-value store that survives process restarts. Keys are the UTF-8 cache
//! keys, values the encoded [`CacheEntry`] bytes.
//!
//! Read transactions serve `get_many`; `set`, `delete` and `clear` each run
//! in their own write transaction.

use std::path::Path;

use async_trait::async_trait;
use grove_core::{GroveError, GroveResult, StorageError};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use super::traits::{CacheBackend, CacheEntry, CacheStats};

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for GroveError {
    fn from(e: LmdbCacheError) -> Self {
        GroveError::Storage(StorageError::Cache {
            reason: e.to_string(),
        })
    }
}

/// LMDB-backed cache backend.
///
/// # Example
///
/// ```ignore
/// use grove_storage::{LmdbCacheBackend, ReadThroughCache};
///
/// let backend = Arc::new(LmdbCacheBackend::new("/var/cache/grove", 256)?);
/// let cache = ReadThroughCache::with_defaults(backend);
/// ```
pub struct LmdbCacheBackend {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbCacheBackend {
    /// Create a new LMDB cache backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    async fn get_many(&self, keys: &[String]) -> GroveResult<Vec<Option<CacheEntry>>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            let bytes = self
                .db
                .get(&rtxn, key.as_bytes())
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            found.push(bytes.map(CacheEntry::decode).transpose()?);
        }
        Ok(found)
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> GroveResult<()> {
        let bytes = entry.encode()?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, key.as_bytes(), &bytes)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> GroveResult<bool> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let deleted = self
            .db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(deleted)
    }

    async fn clear(&self) -> GroveResult<u64> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let count = self
            .db
            .len(&wtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .clear(&mut wtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(count)
    }

    async fn stats(&self) -> GroveResult<CacheStats> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut stats = CacheStats::default();
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        for result in iter {
            let (key, value) = result.map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            stats.entry_count += 1;
            stats.memory_bytes += (key.len() + value.len()) as u64;
        }

        Ok(stats)
    }

    fn is_persistent(&self) -> bool {
        true
    }
}
