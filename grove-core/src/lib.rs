//! GROVE Core - Entity Types and Path Codec
//!
//! Pure data structures and pure functions. Every other crate depends on
//! this one; nothing here touches a store, a cache or the network.

use chrono::{DateTime, Utc};

pub mod config;
pub mod entities;
pub mod error;
pub mod event;
pub mod path;
pub mod tags;
pub mod uid;
pub mod wildcard;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use config::{CacheConfig, GroveConfig, PathConfig, ReadmarkConfig};
pub use entities::{
    ChangedAttributes, EntityType, Filing, LocationId, LocationRecord, NewPost, OwnerId, Post,
    PostDraft, PostId, PostUpdate, Readmark, ReadmarkId, DEFAULT_KIND,
};
pub use error::{ConfigError, GroveError, GroveResult, PathError, StorageError, ValidationError};
pub use event::{EventKind, MutationKind, Notification, PostMutation};
pub use path::{LabelConstraint, Location, MAX_DEPTH};
pub use tags::{TagInput, Tags};
pub use uid::{Uid, WildcardUid};
pub use wildcard::WildcardPath;
