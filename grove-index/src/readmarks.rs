//! Unread counters per `(owner, path)`.
//!
//! A readmark's `unread_count` is the number of filings at or below its
//! path whose post is not deleted and has an id above the cursor. Fan-out
//! keeps it current with atomic store-side increments; [`recount`]
//! recomputes it from scratch.
//!
//! [`recount`]: ReadmarkTracker::recount

use std::sync::Arc;

use grove_core::{
    EntityType, GroveError, GroveResult, Location, LocationRecord, OwnerId, PostId,
    PostMutation, Readmark, ReadmarkConfig, StorageError,
};
use grove_storage::GroveStore;

use crate::directory::LocationDirectory;

#[derive(Clone)]
pub struct ReadmarkTracker {
    store: Arc<dyn GroveStore>,
    directory: LocationDirectory,
    config: ReadmarkConfig,
}

impl ReadmarkTracker {
    pub fn new(
        store: Arc<dyn GroveStore>,
        directory: LocationDirectory,
        config: ReadmarkConfig,
    ) -> Self {
        Self {
            store,
            directory,
            config,
        }
    }

    /// A post became countable at `path`.
    ///
    /// Bumps every readmark at `path` or an ancestor whose cursor is below
    /// `post_id`. Returns the number of readmarks touched.
    pub async fn post_added(&self, path: &Location, post_id: PostId) -> GroveResult<u64> {
        let touched = self
            .store
            .readmarks_adjust_unread(path, post_id, 1, self.config.floor_at_zero)
            .await?;
        tracing::debug!(path = %path, post_id = %post_id, touched, "readmarks incremented");
        Ok(touched)
    }

    /// A post stopped being countable at `path`. Mirrors [`post_added`].
    ///
    /// [`post_added`]: Self::post_added
    pub async fn post_removed(&self, path: &Location, post_id: PostId) -> GroveResult<u64> {
        let touched = self
            .store
            .readmarks_adjust_unread(path, post_id, -1, self.config.floor_at_zero)
            .await?;
        tracing::debug!(path = %path, post_id = %post_id, touched, "readmarks decremented");
        Ok(touched)
    }

    /// Apply the readmark side of a committed post mutation.
    pub async fn apply(&self, mutation: &PostMutation) -> GroveResult<()> {
        let post_id = mutation.post.id;
        for path in &mutation.uncounted_paths {
            self.post_removed(path, post_id).await?;
        }
        for path in &mutation.counted_paths {
            self.post_added(path, post_id).await?;
        }
        Ok(())
    }

    /// Recompute the count from the store and overwrite it.
    pub async fn recount(&self, readmark: &Readmark) -> GroveResult<Readmark> {
        let current = self
            .store
            .readmark_get(readmark.id)
            .await?
            .ok_or_else(|| GroveError::not_found(EntityType::Readmark, readmark.id.to_string()))?;
        let count = self
            .store
            .filings_count_below(&current.path, current.post_id)
            .await?;
        if count != current.unread_count {
            tracing::debug!(
                readmark_id = %current.id,
                stored = current.unread_count,
                actual = count,
                "readmark count corrected"
            );
        }
        self.store
            .readmark_set(current.id, current.post_id, count)
            .await
    }

    /// Move the `(owner, path)` cursor to `post_id` and recount.
    pub async fn set(&self, owner: OwnerId, path: &str, post_id: PostId) -> GroveResult<Readmark> {
        let location = self.directory.declare(path).await?;
        let readmark = self.find_or_create(owner, &location).await?;
        let moved = self
            .store
            .readmark_set(readmark.id, post_id, readmark.unread_count)
            .await?;
        self.recount(&moved).await
    }

    /// Start watching `path`, counting everything below it.
    ///
    /// An existing readmark keeps its cursor and is only recounted.
    pub async fn watch(&self, owner: OwnerId, path: &str) -> GroveResult<Readmark> {
        let location = self.directory.declare(path).await?;
        let readmark = self.find_or_create(owner, &location).await?;
        self.recount(&readmark).await
    }

    pub async fn find(&self, owner: OwnerId, path: &str) -> GroveResult<Option<Readmark>> {
        match self.directory.find(path).await? {
            Some(location) => self.store.readmark_find(owner, location.id).await,
            None => Ok(None),
        }
    }

    pub async fn list_for_owner(&self, owner: OwnerId) -> GroveResult<Vec<Readmark>> {
        self.store.readmarks_for_owner(owner).await
    }

    async fn find_or_create(
        &self,
        owner: OwnerId,
        location: &LocationRecord,
    ) -> GroveResult<Readmark> {
        if let Some(readmark) = self.store.readmark_find(owner, location.id).await? {
            return Ok(readmark);
        }
        match self.store.readmark_insert(owner, location).await {
            Ok(readmark) => Ok(readmark),
            Err(GroveError::Storage(StorageError::UniqueViolation { .. })) => self
                .store
                .readmark_find(owner, location.id)
                .await?
                .ok_or_else(|| {
                    GroveError::not_found(
                        EntityType::Readmark,
                        format!("{}:{}", owner, location.location),
                    )
                }),
            Err(e) => Err(e),
        }
    }
}
