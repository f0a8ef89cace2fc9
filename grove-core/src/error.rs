//! Error types for GROVE operations

use crate::EntityType;
use thiserror::Error;

/// Malformed path or wildcard pattern.
///
/// Raised synchronously while parsing; nothing is ever partially applied
/// when one of these comes back.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid path '{path}': path is empty")]
    Empty { path: String },

    #[error("invalid path '{path}': depth {depth} exceeds maximum of {max}")]
    TooDeep { path: String, depth: usize, max: usize },

    #[error("invalid path '{path}': label {index} is present after an absent label")]
    StrayGap { path: String, index: usize },

    #[error("invalid path '{path}': segment {index} is empty")]
    EmptySegment { path: String, index: usize },

    #[error("invalid path '{path}': label '{label}' contains illegal characters")]
    InvalidLabel { path: String, label: String },

    #[error("invalid path '{path}': wildcards terminate the path")]
    MisplacedWildcard { path: String },

    #[error("invalid path '{path}': '^' may only prefix a single segment")]
    MisplacedOptional { path: String },
}

impl PathError {
    /// The offending path or pattern.
    pub fn path(&self) -> &str {
        match self {
            Self::Empty { path }
            | Self::TooDeep { path, .. }
            | Self::StrayGap { path, .. }
            | Self::EmptySegment { path, .. }
            | Self::InvalidLabel { path, .. }
            | Self::MisplacedWildcard { path }
            | Self::MisplacedOptional { path } => path,
        }
    }
}

/// Backing store and cache transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Backend failure: {reason}")]
    Backend { reason: String },

    #[error("Unique constraint violated on {entity_type:?}: {key}")]
    UniqueViolation { entity_type: EntityType, key: String },

    #[error("Serialization failed for {entity_type:?}: {reason}")]
    Serialization { entity_type: EntityType, reason: String },

    #[error("Cache failure: {reason}")]
    Cache { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid uid '{uid}': {reason}")]
    InvalidUid { uid: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all GROVE errors.
#[derive(Debug, Clone, Error)]
pub enum GroveError {
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    #[error("{entity:?} not found: {key}")]
    NotFound { entity: EntityType, key: String },

    #[error("Conflict on {entity:?} {key}: expected version {expected}, found {actual}")]
    Conflict {
        entity: EntityType,
        key: String,
        expected: i64,
        actual: i64,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl GroveError {
    /// Shorthand for a lookup miss where the caller expected a row.
    pub fn not_found(entity: EntityType, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Shorthand for a backing store failure.
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Storage(StorageError::Backend {
            reason: reason.into(),
        })
    }

    pub fn is_invalid_path(&self) -> bool {
        matches!(self, Self::InvalidPath(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_backing_store(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type alias for GROVE operations.
pub type GroveResult<T> = Result<T, GroveError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_display_names_pattern() {
        let err = PathError::MisplacedWildcard {
            path: "a.*.b".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("invalid path"));
        assert!(msg.contains("a.*.b"));
        assert_eq!(err.path(), "a.*.b");
    }

    #[test]
    fn test_path_error_display_too_deep() {
        let err = PathError::TooDeep {
            path: "a.b".to_string(),
            depth: 11,
            max: 10,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("11"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_invalid_path_is_transparent() {
        let err = GroveError::from(PathError::Empty {
            path: String::new(),
        });
        assert!(err.is_invalid_path());
        assert!(format!("{}", err).starts_with("invalid path"));
    }

    #[test]
    fn test_conflict_display() {
        let err = GroveError::Conflict {
            entity: EntityType::Post,
            key: "7".to_string(),
            expected: 2,
            actual: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Post"));
        assert!(msg.contains("expected version 2"));
        assert!(err.is_conflict());
    }

    #[test]
    fn test_grove_error_from_variants() {
        let storage = GroveError::from(StorageError::LockPoisoned);
        assert!(storage.is_backing_store());

        let validation = GroveError::from(ValidationError::RequiredFieldMissing {
            field: "canonical_path".to_string(),
        });
        assert!(matches!(validation, GroveError::Validation(_)));

        let config = GroveError::from(ConfigError::InvalidValue {
            field: "cache.key_prefix".to_string(),
            value: "a b".to_string(),
            reason: "no whitespace".to_string(),
        });
        assert!(matches!(config, GroveError::Config(_)));

        let missing = GroveError::not_found(EntityType::Readmark, "1:a.b");
        assert!(missing.is_not_found());
        assert!(!missing.is_backing_store());
    }
}
