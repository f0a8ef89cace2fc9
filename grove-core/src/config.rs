//! Configuration types
//!
//! Loaded from `GROVE_*` environment variables with defaults suitable for
//! development. Hosts construct the config once and pass it into the
//! components that need it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::entities::DEFAULT_KIND;
use crate::error::{ConfigError, GroveError, GroveResult};
use crate::path::{valid_label, MAX_DEPTH};

/// Read-through cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false every read goes straight to the store.
    pub enabled: bool,
    /// How long an absent UID is remembered. `None` never caches misses.
    pub negative_ttl: Option<Duration>,
    /// Optional expiry for positive entries. Invalidation on write is what
    /// keeps entries correct; this only bounds memory.
    pub entry_ttl: Option<Duration>,
    /// Prepended to every cache key.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            negative_ttl: None,
            entry_ttl: None,
            key_prefix: String::new(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache absent UIDs for `ttl`.
    pub fn with_negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = Some(ttl);
        self
    }

    pub fn with_entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = Some(ttl);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Path settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathConfig {
    /// Must equal [`MAX_DEPTH`]; locations are fixed-width.
    pub max_depth: usize,
    /// UID kind assigned to posts created without one.
    pub default_kind: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            default_kind: DEFAULT_KIND.to_string(),
        }
    }
}

/// Readmark settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadmarkConfig {
    /// Clamp decrements at zero.
    pub floor_at_zero: bool,
}

impl Default for ReadmarkConfig {
    fn default() -> Self {
        Self {
            floor_at_zero: true,
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroveConfig {
    pub cache: CacheConfig,
    pub paths: PathConfig,
    pub readmarks: ReadmarkConfig,
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

impl GroveConfig {
    /// Create GroveConfig from environment variables.
    ///
    /// Environment variables:
    /// - `GROVE_CACHE_ENABLED`: "true" or "false" (default: true)
    /// - `GROVE_CACHE_NEGATIVE_TTL_SECS`: cache absent UIDs this long (default: unset, never)
    /// - `GROVE_CACHE_ENTRY_TTL_SECS`: expire positive entries (default: unset, never)
    /// - `GROVE_CACHE_KEY_PREFIX`: cache key prefix (default: empty)
    /// - `GROVE_DEFAULT_KIND`: UID kind for new posts (default: post)
    /// - `GROVE_READMARK_FLOOR_AT_ZERO`: "true" or "false" (default: true)
    pub fn from_env() -> Self {
        let enabled = std::env::var("GROVE_CACHE_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let key_prefix = std::env::var("GROVE_CACHE_KEY_PREFIX").unwrap_or_default();

        let default_kind =
            std::env::var("GROVE_DEFAULT_KIND").unwrap_or_else(|_| DEFAULT_KIND.to_string());

        let floor_at_zero = std::env::var("GROVE_READMARK_FLOOR_AT_ZERO")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            cache: CacheConfig {
                enabled,
                negative_ttl: env_secs("GROVE_CACHE_NEGATIVE_TTL_SECS"),
                entry_ttl: env_secs("GROVE_CACHE_ENTRY_TTL_SECS"),
                key_prefix,
            },
            paths: PathConfig {
                max_depth: MAX_DEPTH,
                default_kind,
            },
            readmarks: ReadmarkConfig { floor_at_zero },
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> GroveResult<()> {
        if self.paths.max_depth != MAX_DEPTH {
            return Err(GroveError::Config(ConfigError::InvalidValue {
                field: "paths.max_depth".to_string(),
                value: self.paths.max_depth.to_string(),
                reason: format!("max_depth is fixed at {}", MAX_DEPTH),
            }));
        }

        if !valid_label(&self.paths.default_kind) {
            return Err(GroveError::Config(ConfigError::InvalidValue {
                field: "paths.default_kind".to_string(),
                value: self.paths.default_kind.clone(),
                reason: "default_kind must be a plain label".to_string(),
            }));
        }

        if self.cache.key_prefix.chars().any(char::is_whitespace) {
            return Err(GroveError::Config(ConfigError::InvalidValue {
                field: "cache.key_prefix".to_string(),
                value: self.cache.key_prefix.clone(),
                reason: "key_prefix must not contain whitespace".to_string(),
            }));
        }

        if matches!(self.cache.negative_ttl, Some(ttl) if ttl.is_zero()) {
            return Err(GroveError::Config(ConfigError::InvalidValue {
                field: "cache.negative_ttl".to_string(),
                value: "0s".to_string(),
                reason: "negative_ttl must be positive when set".to_string(),
            }));
        }

        if matches!(self.cache.entry_ttl, Some(ttl) if ttl.is_zero()) {
            return Err(GroveError::Config(ConfigError::InvalidValue {
                field: "cache.entry_ttl".to_string(),
                value: "0s".to_string(),
                reason: "entry_ttl must be positive when set".to_string(),
            }));
        }

        Ok(())
    }
}
