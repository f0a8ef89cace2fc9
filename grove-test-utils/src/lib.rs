//! GROVE Test Utilities
//!
//! Proptest generators, a wired in-memory harness with switchable failures,
//! and assertions shared by the integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use grove_core::{
    GroveConfig, GroveError, GroveResult, Notification, OwnerId, StorageError, MAX_DEPTH,
};
use grove_events::{InMemoryEmitter, NotificationEmitter};
use grove_index::Grove;
use grove_storage::{CacheBackend, CacheEntry, CacheStats, InMemoryCacheBackend, InMemoryStore};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for paths, labels and tags.

    use super::*;
    use proptest::prelude::*;

    /// A single legal path label.
    pub fn arb_label() -> impl Strategy<Value = String> {
        "[a-z0-9_-]{1,8}"
    }

    /// A present-labels-only sequence of 1..=MAX_DEPTH labels.
    pub fn arb_labels() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_label(), 1..=MAX_DEPTH)
    }

    /// A dotted concrete path.
    pub fn arb_path() -> impl Strategy<Value = String> {
        arb_labels().prop_map(|labels| labels.join("."))
    }

    /// A dotted path over a tiny alphabet, so generated paths often nest.
    pub fn arb_nested_path() -> impl Strategy<Value = String> {
        prop::collection::vec("[ab]", 1..4).prop_map(|labels| labels.join("."))
    }

    /// A full label tuple with at least one present label after an absent
    /// one.
    pub fn arb_stray_gap_labels() -> impl Strategy<Value = [Option<String>; MAX_DEPTH]> {
        (arb_labels(), 0..MAX_DEPTH - 1, arb_label()).prop_map(|(labels, gap, stray)| {
            let mut tuple: [Option<String>; MAX_DEPTH] = Default::default();
            for (index, label) in labels.into_iter().enumerate() {
                tuple[index] = Some(label);
            }
            tuple[gap] = None;
            tuple[MAX_DEPTH - 1] = Some(stray);
            tuple
        })
    }

    /// Raw tags with mixed case and decoration.
    pub fn arb_raw_tags() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[!(]?[A-Za-z]{1,6}[!?.)]?", 0..6)
    }
}

// ============================================================================
// FAILURE-INJECTING COLLABORATORS
// ============================================================================

/// In-memory cache backend whose deletes can be made to fail.
#[derive(Default)]
pub struct FlakyCacheBackend {
    inner: InMemoryCacheBackend,
    failing: AtomicBool,
}

impl FlakyCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delete fail until switched back.
    pub fn fail_deletes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }
}

#[async_trait]
impl CacheBackend for FlakyCacheBackend {
    async fn get_many(&self, keys: &[String]) -> GroveResult<Vec<Option<CacheEntry>>> {
        self.inner.get_many(keys).await
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> GroveResult<()> {
        self.inner.set(key, entry).await
    }

    async fn delete(&self, key: &str) -> GroveResult<bool> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GroveError::Storage(StorageError::Cache {
                reason: "cache server unavailable".to_string(),
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

/// Recording emitter that can be made to fail.
#[derive(Default)]
pub struct FlakyEmitter {
    inner: InMemoryEmitter,
    failing: AtomicBool,
}

impl FlakyEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_emits(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Drain every successfully emitted notification.
    pub fn take(&self) -> Vec<Notification> {
        self.inner.take()
    }
}

#[async_trait]
impl NotificationEmitter for FlakyEmitter {
    async fn emit(&self, notification: &Notification) -> GroveResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GroveError::backend("event bus unavailable"));
        }
        self.inner.emit(notification).await
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-wired in-memory instances.

    use super::*;

    /// A [`Grove`] over in-memory collaborators, with handles kept for
    /// inspection and failure injection.
    pub struct Harness {
        pub store: InMemoryStore,
        pub cache: Arc<FlakyCacheBackend>,
        pub emitter: Arc<FlakyEmitter>,
        pub grove: Grove<FlakyCacheBackend>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_config(GroveConfig::default())
        }

        pub fn with_config(config: GroveConfig) -> Self {
            let store = InMemoryStore::new();
            let cache = Arc::new(FlakyCacheBackend::new());
            let emitter = Arc::new(FlakyEmitter::new());
            let grove = Grove::new(
                config,
                Arc::new(store.clone()),
                cache.clone(),
                emitter.clone(),
            )
            .expect("harness config is valid");
            Self {
                store,
                cache,
                emitter,
                grove,
            }
        }
    }

    impl Default for Harness {
        fn default() -> Self {
            Self::new()
        }
    }

    /// A fixed owner for single-subscriber scenarios.
    pub fn owner() -> OwnerId {
        OwnerId(1)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for readmark state.

    use super::*;

    /// Assert the stored unread count for `(owner, path)`, and that a
    /// recount agrees with it.
    pub async fn assert_unread(
        grove: &Grove<FlakyCacheBackend>,
        owner: OwnerId,
        path: &str,
        expected: i64,
    ) {
        let readmark = grove
            .readmarks()
            .find(owner, path)
            .await
            .expect("readmark lookup")
            .unwrap_or_else(|| panic!("no readmark for {} at {}", owner, path));
        assert_eq!(
            readmark.unread_count, expected,
            "unread count at {} for owner {}",
            path, owner
        );
        let recounted = grove
            .readmarks()
            .recount(&readmark)
            .await
            .expect("recount");
        assert_eq!(
            recounted.unread_count, expected,
            "recount at {} for owner {}",
            path, owner
        );
    }
}
