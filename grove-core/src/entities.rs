//! Entity types: locations, posts, filings and readmarks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{GroveResult, ValidationError};
use crate::path::Location;
use crate::tags::{TagInput, Tags};
use crate::uid::Uid;
use crate::Timestamp;

/// Entity type discriminator used in errors and cache stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Location,
    Post,
    Filing,
    Readmark,
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn as_i64(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Store-assigned, monotonically increasing post identifier.
    PostId
);
entity_id!(LocationId);
entity_id!(ReadmarkId);
entity_id!(
    /// Opaque identity of a readmark owner.
    OwnerId
);

/// Default UID kind for posts.
pub const DEFAULT_KIND: &str = "post";

/// Attribute name to before/after values.
pub type ChangedAttributes = BTreeMap<String, (Value, Value)>;

// ============================================================================
// LOCATION
// ============================================================================

/// Persisted canonical location row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: LocationId,
    pub location: Location,
}

/// Association row between a post and a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Filing {
    pub post_id: PostId,
    pub location_id: LocationId,
}

// ============================================================================
// POST
// ============================================================================

/// A content item indexed under one or more paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub kind: String,
    pub canonical_path: Location,
    /// Explicit object id; the numeric id stands in when absent.
    pub oid: Option<String>,
    pub paths: BTreeSet<Location>,
    pub document: Value,
    pub tags: Tags,
    pub published: bool,
    pub deleted: bool,
    pub created_by: Option<i64>,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Post {
    pub fn uid(&self) -> Uid {
        Uid::from_parts(&self.kind, &self.canonical_path, self.effective_oid())
    }

    pub fn effective_oid(&self) -> String {
        self.oid.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// UID under which this post is announced for one of its paths.
    pub fn uid_for_path(&self, path: &Location) -> String {
        format!("{}:{}${}", self.kind, path, self.id)
    }

    pub fn realm(&self) -> Option<&str> {
        self.canonical_path.label(0)
    }

    pub fn box_name(&self) -> Option<&str> {
        self.canonical_path.label(1)
    }

    pub fn collection(&self) -> Option<&str> {
        self.canonical_path.label(2)
    }

    /// Counted by readmarks.
    pub fn is_countable(&self) -> bool {
        !self.deleted
    }

    /// Exported attribute map used for cache values and notifications.
    pub fn attributes_for_export(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.insert("uid".to_string(), Value::String(self.uid().to_string()));
                map
            }
            _ => Map::new(),
        }
    }

    /// Every exported attribute whose value differs from `before`.
    ///
    /// Compound fields such as `document` are compared as whole values, so a
    /// nested change reports the full before and after documents.
    pub fn changes_from(&self, before: &Post) -> ChangedAttributes {
        let old = before.attributes_for_export();
        let new = self.attributes_for_export();
        let mut changes = ChangedAttributes::new();
        for (key, new_value) in &new {
            if key == "updated_at" {
                continue;
            }
            let old_value = old.get(key).cloned().unwrap_or(Value::Null);
            if &old_value != new_value {
                changes.insert(key.clone(), (old_value, new_value.clone()));
            }
        }
        changes
    }
}

/// Attributes for creating a post.
///
/// Placement resolves in order: an explicit `uid`, then
/// `realm`/`box_name`/`collection`, then `canonical_path`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub uid: Option<String>,
    pub kind: Option<String>,
    pub realm: Option<String>,
    pub box_name: Option<String>,
    pub collection: Option<String>,
    pub canonical_path: Option<String>,
    pub oid: Option<String>,
    /// Extra paths; the canonical path is always filed.
    pub paths: Vec<String>,
    pub document: Option<Value>,
    pub tags: Option<TagInput>,
    pub published: Option<bool>,
    pub created_by: Option<i64>,
}

impl NewPost {
    pub fn at_path(path: impl Into<String>) -> Self {
        Self {
            canonical_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Default::default()
        }
    }

    pub fn document(mut self, document: Value) -> Self {
        self.document = Some(document);
        self
    }

    pub fn tags(mut self, tags: impl Into<TagInput>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn published(mut self, published: bool) -> Self {
        self.published = Some(published);
        self
    }

    pub fn also_at(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Validate and resolve into a storable draft.
    pub fn resolve(&self, default_kind: &str) -> GroveResult<PostDraft> {
        let (kind, canonical_path, oid) = if let Some(uid) = &self.uid {
            let uid = Uid::parse(uid)?;
            (uid.kind().to_string(), uid.location().clone(), Some(uid.oid().to_string()))
        } else {
            let path = match (&self.realm, &self.box_name, &self.collection) {
                (Some(realm), Some(box_name), Some(collection)) => {
                    format!("{}.{}.{}", realm, box_name, collection)
                }
                _ => self.canonical_path.clone().ok_or_else(|| {
                    ValidationError::RequiredFieldMissing {
                        field: "canonical_path".to_string(),
                    }
                })?,
            };
            let kind = self.kind.clone().unwrap_or_else(|| default_kind.to_string());
            let location = Location::parse(&path)?;
            // Validates kind and oid shape together.
            Uid::new(&kind, &path, self.oid.as_deref().unwrap_or("0"))?;
            (kind, location, self.oid.clone())
        };

        let mut paths = BTreeSet::new();
        paths.insert(canonical_path.clone());
        for path in &self.paths {
            paths.insert(Location::parse(path)?);
        }

        Ok(PostDraft {
            kind,
            canonical_path,
            oid,
            paths,
            document: self.document.clone().unwrap_or(Value::Null),
            tags: self.tags.clone().map(Tags::normalize).unwrap_or_default(),
            published: self.published.unwrap_or(true),
            created_by: self.created_by,
        })
    }
}

/// Resolved, validated post fields awaiting an id from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub kind: String,
    pub canonical_path: Location,
    pub oid: Option<String>,
    pub paths: BTreeSet<Location>,
    pub document: Value,
    pub tags: Tags,
    pub published: bool,
    pub created_by: Option<i64>,
}

/// Attribute changes for [`Post`] update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostUpdate {
    pub document: Option<Value>,
    pub tags: Option<TagInput>,
    pub published: Option<bool>,
    pub paths: Option<Vec<String>>,
    pub deleted: Option<bool>,
}

impl PostUpdate {
    pub fn document(mut self, document: Value) -> Self {
        self.document = Some(document);
        self
    }

    pub fn tags(mut self, tags: impl Into<TagInput>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn published(mut self, published: bool) -> Self {
        self.published = Some(published);
        self
    }

    pub fn paths<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    /// Apply onto a copy of `post`. Version and timestamps are untouched.
    pub fn apply(&self, post: &Post) -> GroveResult<Post> {
        let mut next = post.clone();
        if let Some(document) = &self.document {
            next.document = document.clone();
        }
        if let Some(tags) = &self.tags {
            next.tags = Tags::normalize(tags.clone());
        }
        if let Some(published) = self.published {
            next.published = published;
        }
        if let Some(deleted) = self.deleted {
            next.deleted = deleted;
        }
        if let Some(paths) = &self.paths {
            next.paths = paths
                .iter()
                .map(|p| Location::parse(p))
                .collect::<Result<_, _>>()?;
        }
        Ok(next)
    }
}

// ============================================================================
// READMARK
// ============================================================================

/// Per-owner watch on a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readmark {
    pub id: ReadmarkId,
    pub owner: OwnerId,
    pub location_id: LocationId,
    pub path: Location,
    /// Highest post id already seen.
    pub post_id: PostId,
    pub unread_count: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn post(id: i64, oid: Option<&str>) -> Post {
        let path = Location::parse("area51.box.forum1").unwrap();
        Post {
            id: PostId(id),
            kind: DEFAULT_KIND.to_string(),
            canonical_path: path.clone(),
            oid: oid.map(str::to_string),
            paths: BTreeSet::from([path]),
            document: json!({"text": "blipp"}),
            tags: Tags::default(),
            published: false,
            deleted: false,
            created_by: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_generates_path_from_realm_box_collection() {
        let draft = NewPost {
            realm: Some("area51".to_string()),
            box_name: Some("vaktmesterkontoret".to_string()),
            collection: Some("forum1".to_string()),
            oid: Some("name".to_string()),
            ..Default::default()
        }
        .resolve(DEFAULT_KIND)
        .unwrap();
        assert_eq!(draft.canonical_path.path(), "area51.vaktmesterkontoret.forum1");
        assert_eq!(draft.oid.as_deref(), Some("name"));
        assert_eq!(draft.kind, "post");
    }

    #[test]
    fn test_uid_assignment_decomposes_fields() {
        let draft = NewPost::with_uid("post:area51.vaktmesterkontoret.forum1$name")
            .resolve(DEFAULT_KIND)
            .unwrap();
        assert_eq!(draft.canonical_path.label(0), Some("area51"));
        assert_eq!(draft.canonical_path.label(1), Some("vaktmesterkontoret"));
        assert_eq!(draft.canonical_path.label(2), Some("forum1"));
        assert_eq!(draft.oid.as_deref(), Some("name"));
    }

    #[test]
    fn test_resolve_files_canonical_path_and_extras() {
        let draft = NewPost::at_path("a.b")
            .also_at("a.c.d")
            .tags("Bing, bang")
            .resolve(DEFAULT_KIND)
            .unwrap();
        let paths: Vec<String> = draft.paths.iter().map(|p| p.path()).collect();
        assert_eq!(paths, vec!["a.b", "a.c.d"]);
        assert_eq!(draft.tags, vec!["bing", "bang"]);
        assert!(draft.published);
    }

    #[test]
    fn test_resolve_requires_placement() {
        assert!(NewPost::default().resolve(DEFAULT_KIND).is_err());
        assert!(NewPost::at_path("a..b").resolve(DEFAULT_KIND).unwrap_err().is_invalid_path());
    }

    #[test]
    fn test_uid_falls_back_to_numeric_id() {
        assert_eq!(post(42, None).uid().to_string(), "post:area51.box.forum1$42");
        assert_eq!(post(42, Some("doc1")).uid().to_string(), "post:area51.box.forum1$doc1");
    }

    #[test]
    fn test_realm_box_collection_accessors() {
        let p = post(1, None);
        assert_eq!(p.realm(), Some("area51"));
        assert_eq!(p.box_name(), Some("box"));
        assert_eq!(p.collection(), Some("forum1"));
    }

    #[test]
    fn test_changes_report_whole_document() {
        let before = post(1, None);
        let mut after = before.clone();
        after.published = true;
        after.document["text"] = json!("jumped over the lazy dog");
        after.version = 2;

        let changes = after.changes_from(&before);
        assert_eq!(changes["published"], (json!(false), json!(true)));
        assert_eq!(
            changes["document"],
            (json!({"text": "blipp"}), json!({"text": "jumped over the lazy dog"}))
        );
        assert_eq!(changes["version"], (json!(1), json!(2)));
        assert!(!changes.contains_key("tags"));
    }

    #[test]
    fn test_update_apply() {
        let before = post(1, None);
        let after = PostUpdate::default()
            .tags(vec!["X"])
            .paths(["a.b", "c"])
            .deleted(true)
            .apply(&before)
            .unwrap();
        assert_eq!(after.tags, vec!["x"]);
        assert_eq!(after.paths.len(), 2);
        assert!(after.deleted);
        assert_eq!(after.version, before.version);
        assert!(PostUpdate::default().paths(["a..b"]).apply(&before).is_err());
    }

    #[test]
    fn test_export_includes_uid_and_version() {
        let attrs = post(3, Some("doc")).attributes_for_export();
        assert_eq!(attrs["uid"], json!("post:area51.box.forum1$doc"));
        assert_eq!(attrs["version"], json!(1));
        assert_eq!(attrs["paths"], json!(["area51.box.forum1"]));
    }
}
