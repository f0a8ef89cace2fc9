//! Post cache keyed by UID.
//!
//! The cache never decides freshness on its own: correctness comes from
//! write-path invalidation, one UID per committed post mutation. Optional
//! TTLs only bound how long entries and negative markers linger.
//!
//! # Example
//!
//! ```ignore
//! let cache = ReadThroughCache::new(Arc::new(InMemoryCacheBackend::new()), config.cache);
//!
//! // One slot per requested UID, in request order
//! let posts = cache.get_all(&[uid_b, uid_a], &store).await?;
//!
//! // After a committed write
//! cache.invalidate(&post.uid()).await;
//! ```

pub mod lmdb_backend;
pub mod memory_backend;
pub mod read_through;
pub mod traits;

pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use memory_backend::InMemoryCacheBackend;
pub use read_through::{Invalidation, PostFetcher, ReadThroughCache};
pub use traits::{CacheBackend, CacheEntry, CacheStats, CachedValue};
