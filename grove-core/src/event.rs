//! Post mutation descriptions and notification payloads.
//!
//! A [`PostMutation`] is the immutable record handed to every fan-out
//! consumer after a post write commits. A [`Notification`] is the wire
//! payload the external event bus receives, one per (post, path) pair.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::{ChangedAttributes, Post};
use crate::path::Location;

/// What happened to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Created,
    Updated,
    SoftDeleted,
    Restored,
    Destroyed,
}

/// Committed post write, as seen by fan-out consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct PostMutation {
    pub kind: MutationKind,
    /// State after the write. For `Destroyed` this is the last known state.
    pub post: Post,
    /// State before the write, absent on create.
    pub previous: Option<Post>,
    pub changes: ChangedAttributes,
    /// Paths that became countable for readmarks.
    pub counted_paths: Vec<Location>,
    /// Paths that stopped being countable for readmarks.
    pub uncounted_paths: Vec<Location>,
}

impl PostMutation {
    pub fn created(post: Post) -> Self {
        let counted_paths = if post.is_countable() {
            post.paths.iter().cloned().collect()
        } else {
            Vec::new()
        };
        Self {
            kind: MutationKind::Created,
            post,
            previous: None,
            changes: ChangedAttributes::new(),
            counted_paths,
            uncounted_paths: Vec::new(),
        }
    }

    /// Classify an update by comparing before and after state.
    ///
    /// A deleted flag flip wins over path changes: soft delete uncounts every
    /// previous path, restore counts every current path. Otherwise the
    /// symmetric difference of the path sets drives the counts, and only for
    /// a post that is not deleted. A post that stays deleted counts nothing
    /// and is classified as a soft delete.
    pub fn updated(previous: Post, post: Post) -> Self {
        let changes = post.changes_from(&previous);
        let (kind, counted_paths, uncounted_paths) = match (previous.deleted, post.deleted) {
            (false, true) => (
                MutationKind::SoftDeleted,
                Vec::new(),
                previous.paths.iter().cloned().collect(),
            ),
            (true, false) => (
                MutationKind::Restored,
                post.paths.iter().cloned().collect(),
                Vec::new(),
            ),
            // Edits to a deleted post are still announced as a soft delete.
            (true, true) => (MutationKind::SoftDeleted, Vec::new(), Vec::new()),
            (false, false) => (
                MutationKind::Updated,
                post.paths.difference(&previous.paths).cloned().collect(),
                previous.paths.difference(&post.paths).cloned().collect(),
            ),
        };
        Self {
            kind,
            post,
            previous: Some(previous),
            changes,
            counted_paths,
            uncounted_paths,
        }
    }

    pub fn destroyed(post: Post) -> Self {
        let uncounted_paths = if post.is_countable() {
            post.paths.iter().cloned().collect()
        } else {
            Vec::new()
        };
        Self {
            kind: MutationKind::Destroyed,
            post,
            previous: None,
            changes: ChangedAttributes::new(),
            counted_paths: Vec::new(),
            uncounted_paths,
        }
    }

    /// UID whose cache entry this mutation makes stale.
    pub fn cache_key(&self) -> String {
        self.post.uid().to_string()
    }
}

/// Event name on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

/// Payload delivered to the external notification emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub uid: String,
    pub event: EventKind,
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_attributes: Option<ChangedAttributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_deleted: Option<bool>,
}
