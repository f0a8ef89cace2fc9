//! Read-through post cache.
//!
//! Batched point lookups by UID with fallback to the store. Every post
//! mutation invalidates the post's UID; an invalidation the backend refuses
//! is queued and the UID bypasses the cache until the eviction lands.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use grove_core::{CacheConfig, GroveResult, Post, Uid};
use tokio::sync::Mutex;

use super::traits::{CacheBackend, CacheEntry, CacheStats};
use crate::GroveStore;

/// Source of truth consulted on cache misses.
#[async_trait]
pub trait PostFetcher: Send + Sync {
    /// Fetch the posts for `uids` in one batch. Unknown UIDs are skipped.
    async fn fetch_posts(&self, uids: &[Uid]) -> GroveResult<Vec<Post>>;
}

#[async_trait]
impl<S: GroveStore + ?Sized> PostFetcher for S {
    async fn fetch_posts(&self, uids: &[Uid]) -> GroveResult<Vec<Post>> {
        self.posts_get_by_uids(uids).await
    }
}

/// Outcome of invalidating one UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// The entry is gone from the backend.
    Evicted,
    /// The backend failed; the UID is queued and bypasses the cache.
    Deferred,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    negative_hits: AtomicU64,
    evictions: AtomicU64,
}

/// Read-through cache over a [`CacheBackend`].
pub struct ReadThroughCache<C: CacheBackend> {
    backend: Arc<C>,
    config: CacheConfig,
    pending: Mutex<BTreeSet<String>>,
    counters: Counters,
}

impl<C: CacheBackend> ReadThroughCache<C> {
    /// Create a new read-through cache.
    pub fn new(backend: Arc<C>, config: CacheConfig) -> Self {
        Self {
            backend,
            config,
            pending: Mutex::new(BTreeSet::new()),
            counters: Counters::default(),
        }
    }

    /// Create a new read-through cache with default configuration.
    pub fn with_defaults(backend: Arc<C>) -> Self {
        Self::new(backend, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend(&self) -> &C {
        &self.backend
    }

    /// Cache key for a UID.
    pub fn key_for(&self, uid: &Uid) -> String {
        format!("{}{}", self.config.key_prefix, uid)
    }

    /// Look up `uids`, returning one slot per input in the same order.
    ///
    /// Hits come from one batched backend read, misses from one batched
    /// fetch, and fetched posts are written back. A fetch failure fails the
    /// whole call; a backend read failure degrades to a full fetch.
    pub async fn get_all<F>(&self, uids: &[Uid], fetcher: &F) -> GroveResult<Vec<Option<Post>>>
    where
        F: PostFetcher + ?Sized,
    {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        if !self.config.enabled {
            let fetched = fetcher.fetch_posts(uids).await?;
            let by_uid: HashMap<Uid, Post> = fetched.into_iter().map(|p| (p.uid(), p)).collect();
            return Ok(uids.iter().map(|uid| by_uid.get(uid).cloned()).collect());
        }

        self.flush_pending_evictions().await;
        let bypass = self.pending.lock().await.clone();

        let keys: Vec<String> = uids.iter().map(|uid| self.key_for(uid)).collect();
        let cached = match self.backend.get_many(&keys).await {
            Ok(entries) if entries.len() == keys.len() => entries,
            Ok(entries) => {
                tracing::warn!(
                    expected = keys.len(),
                    returned = entries.len(),
                    "cache returned a short batch, treating all as misses"
                );
                vec![None; keys.len()]
            }
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed, falling back to store");
                vec![None; keys.len()]
            }
        };

        let now = Utc::now();
        let mut results: Vec<Option<Post>> = vec![None; uids.len()];
        let mut missing: Vec<usize> = Vec::new();
        for (index, entry) in cached.into_iter().enumerate() {
            if bypass.contains(&keys[index]) {
                missing.push(index);
                continue;
            }
            match entry.filter(|e| !e.is_expired(now)) {
                Some(entry) => match entry.post() {
                    Ok(Some(post)) => {
                        self.counters.hits.fetch_add(1, Ordering::Relaxed);
                        results[index] = Some(post);
                    }
                    Ok(None) => {
                        self.counters.negative_hits.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        tracing::warn!(key = %keys[index], error = %e, "undecodable cache entry");
                        missing.push(index);
                    }
                },
                None => missing.push(index),
            }
        }

        if missing.is_empty() {
            return Ok(results);
        }
        self.counters
            .misses
            .fetch_add(missing.len() as u64, Ordering::Relaxed);

        let mut seen = HashSet::new();
        let wanted: Vec<Uid> = missing
            .iter()
            .map(|&index| uids[index].clone())
            .filter(|uid| seen.insert(uid.clone()))
            .collect();
        let fetched = fetcher.fetch_posts(&wanted).await?;
        let by_uid: HashMap<Uid, Post> = fetched.into_iter().map(|p| (p.uid(), p)).collect();

        for uid in &wanted {
            let key = self.key_for(uid);
            if bypass.contains(&key) {
                continue;
            }
            let entry = match by_uid.get(uid) {
                Some(post) => Some(CacheEntry::present(post, self.config.entry_ttl)),
                None => self.config.negative_ttl.map(CacheEntry::absent),
            };
            if let Some(entry) = entry {
                if let Err(e) = self.backend.set(&key, &entry).await {
                    tracing::warn!(key = %key, error = %e, "cache refill failed");
                }
            }
        }

        for index in missing {
            results[index] = by_uid.get(&uids[index]).cloned();
        }
        Ok(results)
    }

    /// Single-UID convenience over [`get_all`](Self::get_all).
    pub async fn get<F>(&self, uid: &Uid, fetcher: &F) -> GroveResult<Option<Post>>
    where
        F: PostFetcher + ?Sized,
    {
        let mut found = self.get_all(std::slice::from_ref(uid), fetcher).await?;
        Ok(found.pop().flatten())
    }

    /// Drop the entry for `uid`.
    ///
    /// A refused delete is queued in process memory only. On a persistent
    /// backend the stale entry survives a restart, so such a backend needs
    /// `entry_ttl` to bound it (enforced by `Grove::new`).
    pub async fn invalidate(&self, uid: &Uid) -> Invalidation {
        if !self.config.enabled {
            return Invalidation::Evicted;
        }
        let key = self.key_for(uid);
        match self.backend.delete(&key).await {
            Ok(_) => {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                self.pending.lock().await.remove(&key);
                tracing::debug!(uid = %uid, "cache entry invalidated");
                Invalidation::Evicted
            }
            Err(e) => {
                tracing::warn!(
                    uid = %uid,
                    error = %e,
                    "cache invalidation failed, eviction deferred"
                );
                self.pending.lock().await.insert(key);
                Invalidation::Deferred
            }
        }
    }

    /// Retry every queued eviction. Returns how many landed.
    pub async fn flush_pending_evictions(&self) -> usize {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return 0;
        }

        let keys: Vec<String> = pending.iter().cloned().collect();
        let mut flushed = 0;
        for key in keys {
            match self.backend.delete(&key).await {
                Ok(_) => {
                    pending.remove(&key);
                    self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                    flushed += 1;
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "deferred cache eviction still failing");
                }
            }
        }
        flushed
    }

    /// Number of UIDs waiting for eviction.
    pub async fn pending_evictions(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Backend occupancy merged with this cache's hit and miss counters.
    pub async fn stats(&self) -> GroveResult<CacheStats> {
        let mut stats = self.backend.stats().await?;
        stats.hits = self.counters.hits.load(Ordering::Relaxed);
        stats.misses = self.counters.misses.load(Ordering::Relaxed);
        stats.negative_hits = self.counters.negative_hits.load(Ordering::Relaxed);
        stats.evictions = self.counters.evictions.load(Ordering::Relaxed);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheBackend;
    use crate::InMemoryStore;
    use grove_core::{GroveError, NewPost, StorageError, DEFAULT_KIND};
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Backend whose writes can be switched off.
    #[derive(Default)]
    struct BrokenDeletes {
        inner: InMemoryCacheBackend,
        failing: AtomicBool,
    }

    #[async_trait]
    impl CacheBackend for BrokenDeletes {
        async fn get_many(&self, keys: &[String]) -> GroveResult<Vec<Option<CacheEntry>>> {
            self.inner.get_many(keys).await
        }

        async fn set(&self, key: &str, entry: &CacheEntry) -> GroveResult<()> {
            self.inner.set(key, entry).await
        }

        async fn delete(&self, key: &str) -> GroveResult<bool> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(GroveError::Storage(StorageError::Cache {
                    reason: "connection refused".to_string(),
                }));
            }
            self.inner.delete(key).await
        }

        async fn clear(&self) -> GroveResult<u64> {
            self.inner.clear().await
        }

        async fn stats(&self) -> GroveResult<CacheStats> {
            self.inner.stats().await
        }
    }

    struct DownStore;

    #[async_trait]
    impl PostFetcher for DownStore {
        async fn fetch_posts(&self, _uids: &[Uid]) -> GroveResult<Vec<Post>> {
            Err(GroveError::backend("connection reset"))
        }
    }

    async fn seed(store: &InMemoryStore, uid: &str) -> Post {
        let draft = NewPost::with_uid(uid)
            .document(json!({"text": "blipp"}))
            .resolve(DEFAULT_KIND)
            .unwrap();
        for path in &draft.paths {
            if store.location_find(path).await.unwrap().is_none() {
                store.location_insert(path).await.unwrap();
            }
        }
        store.post_insert(&draft).await.unwrap()
    }

    fn uid(s: &str) -> Uid {
        Uid::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_get_all_preserves_request_order() {
        let store = InMemoryStore::new();
        let a = seed(&store, "post:a.b$a").await;
        let b = seed(&store, "post:a.b$b").await;
        let cache = ReadThroughCache::with_defaults(Arc::new(InMemoryCacheBackend::new()));

        let found = cache.get_all(&[b.uid(), a.uid()], &store).await.unwrap();
        assert_eq!(found[0].as_ref().map(|p| p.id), Some(b.id));
        assert_eq!(found[1].as_ref().map(|p| p.id), Some(a.id));

        let found = cache.get_all(&[a.uid(), b.uid()], &store).await.unwrap();
        assert_eq!(found[0].as_ref().map(|p| p.id), Some(a.id));
        assert_eq!(found[1].as_ref().map(|p| p.id), Some(b.id));
    }

    #[tokio::test]
    async fn test_partial_hits_fetch_only_misses() {
        let store = InMemoryStore::new();
        let a = seed(&store, "post:a.b$a").await;
        let b = seed(&store, "post:a.b$b").await;
        let cache = ReadThroughCache::with_defaults(Arc::new(InMemoryCacheBackend::new()));

        cache.get_all(&[a.uid()], &store).await.unwrap();
        let found = cache
            .get_all(&[a.uid(), uid("post:a.b$zz"), b.uid()], &store)
            .await
            .unwrap();
        assert_eq!(found.len(), 3);
        assert!(found[0].is_some());
        assert!(found[1].is_none());
        assert!(found[2].is_some());

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.entry_count, 2);
    }

    #[tokio::test]
    async fn test_missing_uid_is_not_cached_by_default() {
        let store = InMemoryStore::new();
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = ReadThroughCache::with_defaults(backend.clone());

        let found = cache.get_all(&[uid("post:a.b$nope")], &store).await.unwrap();
        assert_eq!(found, vec![None]);
        assert!(!backend.contains("post:a.b$nope"));
    }

    #[tokio::test]
    async fn test_negative_marker_expires_and_is_never_a_post() {
        let store = InMemoryStore::new();
        let backend = Arc::new(InMemoryCacheBackend::new());
        let config = CacheConfig::new().with_negative_ttl(Duration::from_secs(60));
        let cache = ReadThroughCache::new(backend.clone(), config);

        let missing = uid("post:a.b$later");
        cache.get_all(&[missing.clone()], &store).await.unwrap();
        assert!(backend.contains("post:a.b$later"));

        cache.get_all(&[missing.clone()], &store).await.unwrap();
        assert_eq!(cache.stats().await.unwrap().negative_hits, 1);

        let post = seed(&store, "post:a.b$later").await;
        assert_eq!(cache.invalidate(&post.uid()).await, Invalidation::Evicted);
        let found = cache.get(&missing, &store).await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(post.id));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refill() {
        let store = InMemoryStore::new();
        let post = seed(&store, "post:a.b$doc").await;
        let cache = ReadThroughCache::with_defaults(Arc::new(InMemoryCacheBackend::new()));

        cache.get(&post.uid(), &store).await.unwrap();

        let mut changed = post.clone();
        changed.document = json!({"text": "jumped over the lazy dog"});
        store.post_update(&changed, 1).await.unwrap();

        let stale = cache.get(&post.uid(), &store).await.unwrap().unwrap();
        assert_eq!(stale.version, 1);

        cache.invalidate(&post.uid()).await;
        let fresh = cache.get(&post.uid(), &store).await.unwrap().unwrap();
        assert_eq!(fresh.version, 2);
        assert_eq!(fresh.document["text"], json!("jumped over the lazy dog"));
    }

    #[tokio::test]
    async fn test_failed_invalidation_is_deferred_and_bypassed() {
        let store = InMemoryStore::new();
        let post = seed(&store, "post:a.b$doc").await;
        let backend = Arc::new(BrokenDeletes::default());
        let cache = ReadThroughCache::with_defaults(backend.clone());

        cache.get(&post.uid(), &store).await.unwrap();
        let mut changed = post.clone();
        changed.published = false;
        store.post_update(&changed, 1).await.unwrap();

        backend.failing.store(true, Ordering::SeqCst);
        assert_eq!(cache.invalidate(&post.uid()).await, Invalidation::Deferred);
        assert_eq!(cache.pending_evictions().await, 1);

        let found = cache.get(&post.uid(), &store).await.unwrap().unwrap();
        assert_eq!(found.version, 2);

        backend.failing.store(false, Ordering::SeqCst);
        assert_eq!(cache.flush_pending_evictions().await, 1);
        assert_eq!(cache.pending_evictions().await, 0);
        let found = cache.get(&post.uid(), &store).await.unwrap().unwrap();
        assert!(!found.published);
    }

    #[tokio::test]
    async fn test_store_failure_fails_whole_call() {
        let cache = ReadThroughCache::with_defaults(Arc::new(InMemoryCacheBackend::new()));
        let err = cache
            .get_all(&[uid("post:a$1"), uid("post:a$2")], &DownStore)
            .await
            .unwrap_err();
        assert!(err.is_backing_store());
    }

    #[tokio::test]
    async fn test_corrupt_backend_degrades_to_store() {
        let store = InMemoryStore::new();
        let post = seed(&store, "post:a.b$doc").await;
        let backend = Arc::new(InMemoryCacheBackend::new());
        backend.insert_raw("post:a.b$doc", b"garbage".to_vec()).unwrap();
        let cache = ReadThroughCache::with_defaults(backend);

        let found = cache.get(&post.uid(), &store).await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(post.id));
    }

    #[tokio::test]
    async fn test_disabled_cache_goes_straight_to_store() {
        let store = InMemoryStore::new();
        let post = seed(&store, "post:a.b$doc").await;
        let backend = Arc::new(InMemoryCacheBackend::new());
        let cache = ReadThroughCache::new(backend.clone(), CacheConfig::disabled());

        let found = cache.get_all(&[post.uid(), post.uid()], &store).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.is_some()));
        assert!(!backend.contains("post:a.b$doc"));
    }

    #[tokio::test]
    async fn test_key_prefix() {
        let cache = ReadThroughCache::new(
            Arc::new(InMemoryCacheBackend::new()),
            CacheConfig::new().with_key_prefix("grove:"),
        );
        assert_eq!(cache.key_for(&uid("post:a$1")), "grove:post:a$1");
    }
}
