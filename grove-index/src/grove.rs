//! Wiring for hosts that want every component built from one config.

use std::sync::Arc;

use grove_core::{ConfigError, GroveConfig, GroveResult};
use grove_events::{NotificationEmitter, TracingEmitter};
use grove_storage::{
    CacheBackend, GroveStore, InMemoryCacheBackend, InMemoryStore, ReadThroughCache,
};

use crate::directory::LocationDirectory;
use crate::posts::PostIndex;
use crate::readmarks::ReadmarkTracker;

/// A configured set of GROVE components sharing one store, cache and
/// emitter.
pub struct Grove<C: CacheBackend> {
    config: GroveConfig,
    directory: LocationDirectory,
    posts: PostIndex<C>,
    readmarks: ReadmarkTracker,
}

impl<C: CacheBackend> Grove<C> {
    /// Validate `config` and wire the components around the injected
    /// collaborators.
    ///
    /// A persistent cache backend requires `cache.entry_ttl`: deferred
    /// evictions live in process memory and are lost on restart.
    pub fn new(
        config: GroveConfig,
        store: Arc<dyn GroveStore>,
        cache_backend: Arc<C>,
        emitter: Arc<dyn NotificationEmitter>,
    ) -> GroveResult<Self> {
        config.validate()?;
        let unbounded = config.cache.enabled && config.cache.entry_ttl.is_none();
        if unbounded && cache_backend.is_persistent() {
            return Err(ConfigError::InvalidValue {
                field: "cache.entry_ttl".to_string(),
                value: "none".to_string(),
                reason: "required with a persistent cache backend".to_string(),
            }
            .into());
        }

        let directory = LocationDirectory::new(store.clone());
        let readmarks =
            ReadmarkTracker::new(store.clone(), directory.clone(), config.readmarks.clone());
        let cache = Arc::new(ReadThroughCache::new(cache_backend, config.cache.clone()));
        let posts = PostIndex::new(
            store,
            directory.clone(),
            cache,
            readmarks.clone(),
            emitter,
            config.paths.default_kind.clone(),
        );

        Ok(Self {
            config,
            directory,
            posts,
            readmarks,
        })
    }

    pub fn config(&self) -> &GroveConfig {
        &self.config
    }

    pub fn directory(&self) -> &LocationDirectory {
        &self.directory
    }

    pub fn posts(&self) -> &PostIndex<C> {
        &self.posts
    }

    pub fn readmarks(&self) -> &ReadmarkTracker {
        &self.readmarks
    }

    pub fn cache(&self) -> &ReadThroughCache<C> {
        self.posts.cache()
    }
}

impl Grove<InMemoryCacheBackend> {
    /// Fully in-process instance that logs notifications via tracing.
    pub fn in_memory(config: GroveConfig) -> GroveResult<Self> {
        Self::new(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryCacheBackend::new()),
            Arc::new(TracingEmitter),
        )
    }
}
