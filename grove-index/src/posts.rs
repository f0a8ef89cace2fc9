//! Post index and post-commit fan-out.
//!
//! Every write commits to the store first. Only then does the index fan
//! out, in this order:
//!
//! 1. cache invalidation of the post's UID (deferred on backend failure),
//! 2. readmark adjustments for every path that gained or lost the post,
//! 3. one notification per filed path.
//!
//! Readmark errors are returned to the caller, who owns the transaction.
//! Cache and emitter failures are logged and do not fail the write.

use std::sync::Arc;

use grove_core::{
    EntityType, GroveError, GroveResult, MutationKind, NewPost, Post, PostId, PostMutation,
    PostUpdate, TagInput, Tags, Uid, WildcardUid,
};
use grove_events::NotificationEmitter;
use grove_storage::{CacheBackend, GroveStore, Invalidation, PostQuery, ReadThroughCache};

use crate::directory::LocationDirectory;
use crate::readmarks::ReadmarkTracker;

/// Sole writer of post state.
pub struct PostIndex<C: CacheBackend> {
    store: Arc<dyn GroveStore>,
    directory: LocationDirectory,
    cache: Arc<ReadThroughCache<C>>,
    readmarks: ReadmarkTracker,
    emitter: Arc<dyn NotificationEmitter>,
    default_kind: String,
}

impl<C: CacheBackend> PostIndex<C> {
    pub fn new(
        store: Arc<dyn GroveStore>,
        directory: LocationDirectory,
        cache: Arc<ReadThroughCache<C>>,
        readmarks: ReadmarkTracker,
        emitter: Arc<dyn NotificationEmitter>,
        default_kind: impl Into<String>,
    ) -> Self {
        Self {
            store,
            directory,
            cache,
            readmarks,
            emitter,
            default_kind: default_kind.into(),
        }
    }

    pub fn cache(&self) -> &ReadThroughCache<C> {
        &self.cache
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Create a post, filing it under its canonical path and any extras.
    pub async fn create(&self, new_post: NewPost) -> GroveResult<Post> {
        let draft = new_post.resolve(&self.default_kind)?;
        for path in &draft.paths {
            self.directory.declare_location(path).await?;
        }
        let post = self.store.post_insert(&draft).await?;
        tracing::debug!(post_id = %post.id, uid = %post.uid(), "post created");

        self.fan_out(&PostMutation::created(post.clone())).await?;
        Ok(post)
    }

    /// Apply `changes` to `post`.
    ///
    /// `post.version` must match the stored version, otherwise the update is
    /// refused with a conflict. A change set that alters nothing is a no-op:
    /// no version bump and no fan-out.
    pub async fn update(&self, post: &Post, changes: PostUpdate) -> GroveResult<Post> {
        let current = self.load(post.id).await?;
        if current.version != post.version {
            return Err(GroveError::Conflict {
                entity: EntityType::Post,
                key: post.id.to_string(),
                expected: post.version,
                actual: current.version,
            });
        }

        let next = changes.apply(&current)?;
        if next == current {
            return Ok(current);
        }
        for path in next.paths.difference(&current.paths) {
            self.directory.declare_location(path).await?;
        }

        let updated = self.store.post_update(&next, current.version).await?;
        let mutation = PostMutation::updated(current, updated.clone());
        tracing::debug!(
            post_id = %updated.id,
            version = updated.version,
            kind = ?mutation.kind,
            changed = mutation.changes.len(),
            "post updated"
        );

        self.fan_out(&mutation).await?;
        Ok(updated)
    }

    /// Flag the post deleted. It stops counting toward readmarks.
    pub async fn soft_delete(&self, post: &Post) -> GroveResult<Post> {
        self.update(post, PostUpdate::default().deleted(true)).await
    }

    /// Clear the deleted flag. The post counts toward readmarks again.
    pub async fn restore(&self, post: &Post) -> GroveResult<Post> {
        self.update(post, PostUpdate::default().deleted(false)).await
    }

    /// Replace the set of paths the post is filed under.
    pub async fn set_paths<S, I>(&self, post: &Post, paths: I) -> GroveResult<Post>
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        self.update(post, PostUpdate::default().paths(paths)).await
    }

    /// Replace the post's tags.
    pub async fn set_tags(&self, post: &Post, tags: impl Into<TagInput>) -> GroveResult<Post> {
        self.update(post, PostUpdate::default().tags(tags)).await
    }

    /// Remove the post and its filings permanently.
    pub async fn destroy(&self, post: &Post) -> GroveResult<Post> {
        let removed = self
            .store
            .post_delete(post.id)
            .await?
            .ok_or_else(|| GroveError::not_found(EntityType::Post, post.id.to_string()))?;
        tracing::debug!(post_id = %removed.id, uid = %removed.uid(), "post destroyed");

        self.fan_out(&PostMutation::destroyed(removed.clone())).await?;
        Ok(removed)
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn find_by_id(&self, id: PostId) -> GroveResult<Post> {
        self.load(id).await
    }

    /// Point lookup by UID. Soft-deleted posts are returned too.
    pub async fn find_by_uid(&self, uid: &str) -> GroveResult<Post> {
        let parsed = Uid::parse(uid)?;
        self.store
            .post_get_by_uid(&parsed)
            .await?
            .ok_or_else(|| GroveError::not_found(EntityType::Post, uid))
    }

    /// Every non-deleted post matching a wildcard UID, each at most once,
    /// ascending by id.
    pub async fn find_all_by_wildcard_uid(&self, pattern: &str) -> GroveResult<Vec<Post>> {
        let pattern = WildcardUid::parse(pattern)?;
        self.store
            .posts_query(&PostQuery::from_wildcard_uid(&pattern))
            .await
    }

    /// Every non-deleted post filed under a path matching `pattern`.
    pub async fn find_by_path(&self, pattern: &str) -> GroveResult<Vec<Post>> {
        let pattern = self.directory.by_path(pattern)?;
        self.store.posts_query(&PostQuery::new().path(pattern)).await
    }

    /// Non-deleted posts carrying every given tag.
    pub async fn with_tags(&self, tags: impl Into<TagInput>) -> GroveResult<Vec<Post>> {
        let tags = Tags::normalize(tags);
        self.store.posts_query(&PostQuery::new().tags(tags)).await
    }

    /// Batched UID lookup through the read-through cache.
    ///
    /// One slot per requested UID, in request order.
    pub async fn get_all(&self, uids: &[&str]) -> GroveResult<Vec<Option<Post>>> {
        let uids = uids
            .iter()
            .map(|uid| Uid::parse(uid))
            .collect::<GroveResult<Vec<_>>>()?;
        self.cache.get_all(&uids, &*self.store).await
    }

    async fn load(&self, id: PostId) -> GroveResult<Post> {
        self.store
            .post_get(id)
            .await?
            .ok_or_else(|| GroveError::not_found(EntityType::Post, id.to_string()))
    }

    // ========================================================================
    // FAN-OUT
    // ========================================================================

    async fn fan_out(&self, mutation: &PostMutation) -> GroveResult<()> {
        let uid = mutation.post.uid();

        // A new UID can only be shadowed by a negative marker.
        let stale_possible =
            mutation.kind != MutationKind::Created || self.cache.config().negative_ttl.is_some();
        if stale_possible && self.cache.invalidate(&uid).await == Invalidation::Deferred {
            tracing::warn!(uid = %uid, "post committed with cache eviction pending");
        }

        self.readmarks.apply(mutation).await?;

        let report = grove_events::publish(&*self.emitter, mutation).await;
        tracing::debug!(
            uid = %uid,
            kind = ?mutation.kind,
            counted = mutation.counted_paths.len(),
            uncounted = mutation.uncounted_paths.len(),
            delivered = report.delivered,
            failed = report.failed,
            "fan-out complete"
        );
        Ok(())
    }
}
