//! GROVE Storage - Storage Trait, In-Memory Store and Post Cache
//!
//! Defines the storage abstraction layer for GROVE rows and the
//! read-through cache that fronts it for bulk UID lookups.

pub mod cache;
pub mod memory;
pub mod store;

pub use memory::InMemoryStore;
pub use store::GroveStore;

pub use cache::{
    CacheBackend, CacheEntry, CacheStats, CachedValue, InMemoryCacheBackend, Invalidation,
    LmdbCacheBackend, LmdbCacheError, PostFetcher, ReadThroughCache,
};

use grove_core::{Post, Tags, WildcardPath, WildcardUid};

// ============================================================================
// QUERY TYPES
// ============================================================================

/// Filter for bulk post lookup. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQuery {
    /// UID kind.
    pub kind: Option<String>,
    /// Matched against every path a post is filed under.
    pub path: Option<WildcardPath>,
    /// Matched against the effective object id.
    pub oid: Option<String>,
    /// AND semantics: a post must carry every tag.
    pub tags: Option<Tags>,
    /// Include soft-deleted posts.
    pub include_deleted: bool,
}

impl PostQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query equivalent of a wildcard UID.
    pub fn from_wildcard_uid(pattern: &WildcardUid) -> Self {
        Self {
            kind: pattern.kind().map(str::to_string),
            path: Some(pattern.path().clone()),
            oid: pattern.oid().map(str::to_string),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn path(mut self, path: WildcardPath) -> Self {
        self.path = Some(path);
        self
    }

    pub fn oid(mut self, oid: impl Into<String>) -> Self {
        self.oid = Some(oid.into());
        self
    }

    pub fn tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    /// In-memory evaluation, shared by stores without predicate pushdown.
    pub fn matches(&self, post: &Post) -> bool {
        if post.deleted && !self.include_deleted {
            return false;
        }
        if self.kind.as_deref().is_some_and(|kind| kind != post.kind) {
            return false;
        }
        if self
            .oid
            .as_deref()
            .is_some_and(|oid| oid != post.effective_oid())
        {
            return false;
        }
        if let Some(tags) = &self.tags {
            if !post.tags.contains_all(tags) {
                return false;
            }
        }
        match &self.path {
            Some(pattern) => post.paths.iter().any(|path| pattern.matches(path)),
            None => true,
        }
    }
}
