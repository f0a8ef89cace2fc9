//! Async storage trait for GROVE rows.
//!
//! The store is the external durable collaborator: it owns rows and their
//! uniqueness constraints, and applies every single call atomically. Hosts
//! that need one post mutation and its readmark fan-out to commit together
//! wrap the calls in their own transaction scope.

use ::async_trait::async_trait;
use grove_core::{
    GroveResult, Location, LocationId, LocationRecord, OwnerId, Post, PostDraft, PostId,
    Readmark, ReadmarkId, Uid,
};

use crate::PostQuery;

/// Async storage trait for locations, posts, filings and readmarks.
#[async_trait]
pub trait GroveStore: Send + Sync {
    // ========================================================================
    // LOCATION OPERATIONS
    // ========================================================================

    /// Find the canonical row for a location.
    async fn location_find(&self, location: &Location) -> GroveResult<Option<LocationRecord>>;

    /// Insert a location row.
    ///
    /// Fails with `StorageError::UniqueViolation` when the label tuple is
    /// already present.
    async fn location_insert(&self, location: &Location) -> GroveResult<LocationRecord>;

    /// Get a location by ID.
    async fn location_get(&self, id: LocationId) -> GroveResult<Option<LocationRecord>>;

    // ========================================================================
    // POST OPERATIONS
    // ========================================================================

    /// Insert a post with version 1 and file it under every draft path.
    ///
    /// Every path must already have a location row.
    async fn post_insert(&self, draft: &PostDraft) -> GroveResult<Post>;

    /// Get a post by ID.
    async fn post_get(&self, id: PostId) -> GroveResult<Option<Post>>;

    /// Get a post by UID, soft-deleted posts included.
    async fn post_get_by_uid(&self, uid: &Uid) -> GroveResult<Option<Post>>;

    /// Batch point lookup. Unknown UIDs are skipped; order is unspecified.
    async fn posts_get_by_uids(&self, uids: &[Uid]) -> GroveResult<Vec<Post>>;

    /// Persist `post` if the stored version still equals `expected_version`.
    ///
    /// Bumps the version, stamps `updated_at` and rewrites the filings when
    /// the path set changed. Fails with `GroveError::Conflict` on a version
    /// mismatch.
    async fn post_update(&self, post: &Post, expected_version: i64) -> GroveResult<Post>;

    /// Posts matching every set field of `query`, ascending by id.
    async fn posts_query(&self, query: &PostQuery) -> GroveResult<Vec<Post>>;

    /// Remove a post and its filings. Returns the removed row.
    async fn post_delete(&self, id: PostId) -> GroveResult<Option<Post>>;

    // ========================================================================
    // FILING OPERATIONS
    // ========================================================================

    /// Filings at or below `path` whose post is not deleted and has an id
    /// greater than `after`.
    async fn filings_count_below(&self, path: &Location, after: PostId) -> GroveResult<i64>;

    // ========================================================================
    // READMARK OPERATIONS
    // ========================================================================

    /// Find the readmark for an `(owner, location)` pair.
    async fn readmark_find(
        &self,
        owner: OwnerId,
        location_id: LocationId,
    ) -> GroveResult<Option<Readmark>>;

    /// Insert a readmark with cursor 0 and no unread posts.
    ///
    /// Fails with `StorageError::UniqueViolation` when the pair exists.
    async fn readmark_insert(
        &self,
        owner: OwnerId,
        location: &LocationRecord,
    ) -> GroveResult<Readmark>;

    /// Get a readmark by ID.
    async fn readmark_get(&self, id: ReadmarkId) -> GroveResult<Option<Readmark>>;

    /// Overwrite cursor and count.
    async fn readmark_set(
        &self,
        id: ReadmarkId,
        cursor: PostId,
        unread_count: i64,
    ) -> GroveResult<Readmark>;

    /// Atomically add `delta` to every readmark watching `path` or one of its
    /// ancestors whose cursor is below `post_id`. Returns the rows touched.
    async fn readmarks_adjust_unread(
        &self,
        path: &Location,
        post_id: PostId,
        delta: i64,
        floor_at_zero: bool,
    ) -> GroveResult<u64>;

    /// All readmarks of an owner, ascending by id.
    async fn readmarks_for_owner(&self, owner: OwnerId) -> GroveResult<Vec<Readmark>>;
}
