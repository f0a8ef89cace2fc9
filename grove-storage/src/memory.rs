//! In-memory store for tests and single-process hosts.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ::async_trait::async_trait;
use chrono::Utc;
use grove_core::{
    EntityType, Filing, GroveError, GroveResult, Location, LocationId, LocationRecord, OwnerId,
    Post, PostDraft, PostId, Readmark, ReadmarkId, StorageError, Uid, ValidationError,
};

use crate::{GroveStore, PostQuery};

#[derive(Debug, Default)]
struct Tables {
    next_location_id: i64,
    next_post_id: i64,
    next_readmark_id: i64,
    locations: HashMap<LocationId, Location>,
    location_ids: HashMap<Location, LocationId>,
    posts: BTreeMap<PostId, Post>,
    uid_index: HashMap<Uid, PostId>,
    filings: BTreeSet<Filing>,
    readmarks: BTreeMap<ReadmarkId, Readmark>,
    readmark_keys: HashMap<(OwnerId, LocationId), ReadmarkId>,
}

impl Tables {
    fn location_id_for(&self, location: &Location) -> GroveResult<LocationId> {
        self.location_ids
            .get(location)
            .copied()
            .ok_or_else(|| GroveError::not_found(EntityType::Location, location.path()))
    }

    fn refile(&mut self, post: &Post) -> GroveResult<()> {
        let mut filings = Vec::with_capacity(post.paths.len());
        for path in &post.paths {
            filings.push(Filing {
                post_id: post.id,
                location_id: self.location_id_for(path)?,
            });
        }
        self.filings.retain(|f| f.post_id != post.id);
        self.filings.extend(filings);
        Ok(())
    }
}

/// In-memory store.
///
/// A single lock guards every table so each call is atomic across them.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> GroveResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| GroveError::Storage(StorageError::LockPoisoned))
    }

    fn write(&self) -> GroveResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| GroveError::Storage(StorageError::LockPoisoned))
    }

    /// Get count of stored posts, soft-deleted ones included.
    pub fn post_count(&self) -> GroveResult<usize> {
        Ok(self.read()?.posts.len())
    }

    /// Get count of stored locations.
    pub fn location_count(&self) -> GroveResult<usize> {
        Ok(self.read()?.locations.len())
    }

    /// Get count of stored filings.
    pub fn filing_count(&self) -> GroveResult<usize> {
        Ok(self.read()?.filings.len())
    }

    /// Overwrite a readmark's count without any bookkeeping.
    ///
    /// Simulates drift from bulk writes done outside the fan-out protocol.
    pub fn force_unread_count(&self, id: ReadmarkId, unread_count: i64) -> GroveResult<()> {
        let mut tables = self.write()?;
        let readmark = tables
            .readmarks
            .get_mut(&id)
            .ok_or_else(|| GroveError::not_found(EntityType::Readmark, id.to_string()))?;
        readmark.unread_count = unread_count;
        Ok(())
    }
}

#[async_trait]
impl GroveStore for InMemoryStore {
    // === Location Operations ===

    async fn location_find(&self, location: &Location) -> GroveResult<Option<LocationRecord>> {
        let tables = self.read()?;
        Ok(tables.location_ids.get(location).map(|id| LocationRecord {
            id: *id,
            location: location.clone(),
        }))
    }

    async fn location_insert(&self, location: &Location) -> GroveResult<LocationRecord> {
        let mut tables = self.write()?;
        if tables.location_ids.contains_key(location) {
            return Err(GroveError::Storage(StorageError::UniqueViolation {
                entity_type: EntityType::Location,
                key: location.path(),
            }));
        }
        tables.next_location_id += 1;
        let id = LocationId(tables.next_location_id);
        tables.locations.insert(id, location.clone());
        tables.location_ids.insert(location.clone(), id);
        Ok(LocationRecord {
            id,
            location: location.clone(),
        })
    }

    async fn location_get(&self, id: LocationId) -> GroveResult<Option<LocationRecord>> {
        let tables = self.read()?;
        Ok(tables.locations.get(&id).map(|location| LocationRecord {
            id,
            location: location.clone(),
        }))
    }

    // === Post Operations ===

    async fn post_insert(&self, draft: &PostDraft) -> GroveResult<Post> {
        let mut tables = self.write()?;
        for path in &draft.paths {
            tables.location_id_for(path)?;
        }

        let id = PostId(tables.next_post_id + 1);
        let now = Utc::now();
        let post = Post {
            id,
            kind: draft.kind.clone(),
            canonical_path: draft.canonical_path.clone(),
            oid: draft.oid.clone(),
            paths: draft.paths.clone(),
            document: draft.document.clone(),
            tags: draft.tags.clone(),
            published: draft.published,
            deleted: false,
            created_by: draft.created_by,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let uid = post.uid();
        if tables.uid_index.contains_key(&uid) {
            return Err(GroveError::Storage(StorageError::UniqueViolation {
                entity_type: EntityType::Post,
                key: uid.to_string(),
            }));
        }

        tables.next_post_id = id.0;
        tables.refile(&post)?;
        tables.uid_index.insert(uid, id);
        tables.posts.insert(id, post.clone());
        Ok(post)
    }

    async fn post_get(&self, id: PostId) -> GroveResult<Option<Post>> {
        let tables = self.read()?;
        Ok(tables.posts.get(&id).cloned())
    }

    async fn post_get_by_uid(&self, uid: &Uid) -> GroveResult<Option<Post>> {
        let tables = self.read()?;
        Ok(tables
            .uid_index
            .get(uid)
            .and_then(|id| tables.posts.get(id))
            .cloned())
    }

    async fn posts_get_by_uids(&self, uids: &[Uid]) -> GroveResult<Vec<Post>> {
        let tables = self.read()?;
        let ids: BTreeSet<PostId> = uids
            .iter()
            .filter_map(|uid| tables.uid_index.get(uid).copied())
            .collect();
        Ok(ids
            .iter()
            .filter_map(|id| tables.posts.get(id).cloned())
            .collect())
    }

    async fn post_update(&self, post: &Post, expected_version: i64) -> GroveResult<Post> {
        let mut tables = self.write()?;
        let stored = tables
            .posts
            .get(&post.id)
            .ok_or_else(|| GroveError::not_found(EntityType::Post, post.id.to_string()))?;

        if stored.version != expected_version {
            return Err(GroveError::Conflict {
                entity: EntityType::Post,
                key: post.id.to_string(),
                expected: expected_version,
                actual: stored.version,
            });
        }
        if stored.uid() != post.uid() {
            return Err(GroveError::Validation(ValidationError::InvalidValue {
                field: "uid".to_string(),
                reason: format!("uid of post {} is immutable", post.id),
            }));
        }

        let mut next = post.clone();
        next.version = stored.version + 1;
        next.created_at = stored.created_at;
        next.updated_at = Utc::now();
        if next.paths != stored.paths {
            tables.refile(&next)?;
        }
        tables.posts.insert(next.id, next.clone());
        Ok(next)
    }

    async fn posts_query(&self, query: &PostQuery) -> GroveResult<Vec<Post>> {
        let tables = self.read()?;
        Ok(tables
            .posts
            .values()
            .filter(|post| query.matches(post))
            .cloned()
            .collect())
    }

    async fn post_delete(&self, id: PostId) -> GroveResult<Option<Post>> {
        let mut tables = self.write()?;
        let removed = tables.posts.remove(&id);
        if let Some(post) = &removed {
            tables.uid_index.remove(&post.uid());
            tables.filings.retain(|f| f.post_id != id);
        }
        Ok(removed)
    }

    // === Filing Operations ===

    async fn filings_count_below(&self, path: &Location, after: PostId) -> GroveResult<i64> {
        let tables = self.read()?;
        let count = tables
            .filings
            .iter()
            .filter(|f| f.post_id > after)
            .filter(|f| {
                tables
                    .posts
                    .get(&f.post_id)
                    .is_some_and(|post| post.is_countable())
            })
            .filter(|f| {
                tables
                    .locations
                    .get(&f.location_id)
                    .is_some_and(|location| location.is_at_or_below(path))
            })
            .count();
        Ok(count as i64)
    }

    // === Readmark Operations ===

    async fn readmark_find(
        &self,
        owner: OwnerId,
        location_id: LocationId,
    ) -> GroveResult<Option<Readmark>> {
        let tables = self.read()?;
        Ok(tables
            .readmark_keys
            .get(&(owner, location_id))
            .and_then(|id| tables.readmarks.get(id))
            .cloned())
    }

    async fn readmark_insert(
        &self,
        owner: OwnerId,
        location: &LocationRecord,
    ) -> GroveResult<Readmark> {
        let mut tables = self.write()?;
        let key = (owner, location.id);
        if tables.readmark_keys.contains_key(&key) {
            return Err(GroveError::Storage(StorageError::UniqueViolation {
                entity_type: EntityType::Readmark,
                key: format!("{}:{}", owner, location.location),
            }));
        }
        tables.next_readmark_id += 1;
        let id = ReadmarkId(tables.next_readmark_id);
        let now = Utc::now();
        let readmark = Readmark {
            id,
            owner,
            location_id: location.id,
            path: location.location.clone(),
            post_id: PostId(0),
            unread_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.readmark_keys.insert(key, id);
        tables.readmarks.insert(id, readmark.clone());
        Ok(readmark)
    }

    async fn readmark_get(&self, id: ReadmarkId) -> GroveResult<Option<Readmark>> {
        let tables = self.read()?;
        Ok(tables.readmarks.get(&id).cloned())
    }

    async fn readmark_set(
        &self,
        id: ReadmarkId,
        cursor: PostId,
        unread_count: i64,
    ) -> GroveResult<Readmark> {
        let mut tables = self.write()?;
        let readmark = tables
            .readmarks
            .get_mut(&id)
            .ok_or_else(|| GroveError::not_found(EntityType::Readmark, id.to_string()))?;
        readmark.post_id = cursor;
        readmark.unread_count = unread_count;
        readmark.updated_at = Utc::now();
        Ok(readmark.clone())
    }

    async fn readmarks_adjust_unread(
        &self,
        path: &Location,
        post_id: PostId,
        delta: i64,
        floor_at_zero: bool,
    ) -> GroveResult<u64> {
        let mut tables = self.write()?;
        // Readmarks watch declared locations, so only declared ancestors can match.
        let watched: HashSet<LocationId> = path
            .ancestors_and_self()
            .iter()
            .filter_map(|ancestor| tables.location_ids.get(ancestor).copied())
            .collect();
        let now = Utc::now();
        let mut touched = 0;
        for readmark in tables.readmarks.values_mut() {
            if readmark.post_id >= post_id || !watched.contains(&readmark.location_id) {
                continue;
            }
            let next = readmark.unread_count + delta;
            readmark.unread_count = if floor_at_zero { next.max(0) } else { next };
            readmark.updated_at = now;
            touched += 1;
        }
        Ok(touched)
    }

    async fn readmarks_for_owner(&self, owner: OwnerId) -> GroveResult<Vec<Readmark>> {
        let tables = self.read()?;
        Ok(tables
            .readmarks
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect())
    }
}
