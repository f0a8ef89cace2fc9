//! Compiled wildcard path patterns.
//!
//! A [`WildcardPath`] carries the constraint list produced by
//! [`path::parse`](crate::path::parse) and can either be pushed down to a
//! store as a predicate or evaluated in memory against a [`Location`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PathError;
use crate::path::{self, LabelConstraint, Location};

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WildcardPath {
    pattern: String,
    constraints: Vec<LabelConstraint>,
}

impl WildcardPath {
    /// Compile a pattern. `*` is accepted as the final segment.
    pub fn compile(pattern: &str) -> Result<Self, PathError> {
        let constraints = path::parse(pattern, true)?;
        Ok(Self {
            pattern: pattern.to_string(),
            constraints,
        })
    }

    /// Pattern selecting a location and everything below it.
    pub fn subtree(location: &Location) -> Self {
        let constraints = location
            .iter()
            .map(|l| LabelConstraint::Equals(l.to_string()))
            .collect();
        Self {
            pattern: format!("{}.*", location.path()),
            constraints,
        }
    }

    /// Pattern selecting exactly one location.
    pub fn exact(location: &Location) -> Self {
        Self {
            pattern: location.path(),
            constraints: location.constraints(),
        }
    }

    /// Pure syntax check, no store access.
    pub fn is_valid(pattern: &str) -> bool {
        path::parse(pattern, true).is_ok()
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Per-position constraints for store-level predicate pushdown.
    ///
    /// Positions past the end of the slice are unconstrained.
    pub fn as_constraints(&self) -> &[LabelConstraint] {
        &self.constraints
    }

    /// In-memory evaluation against a canonical location.
    pub fn matches(&self, location: &Location) -> bool {
        self.constraints
            .iter()
            .enumerate()
            .all(|(index, constraint)| constraint.admits(location.label(index)))
    }

    /// Evaluate against a dotted path; malformed paths never match.
    pub fn matches_path(&self, candidate: &str) -> bool {
        Location::parse(candidate)
            .map(|location| self.matches(&location))
            .unwrap_or(false)
    }
}

impl fmt::Display for WildcardPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}
