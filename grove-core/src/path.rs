//! Path codec: dotted location strings to and from label sequences.
//!
//! A path is up to [`MAX_DEPTH`] labels joined with `.`. Patterns extend the
//! plain syntax with three operators:
//!
//! - a terminal `*` leaves every deeper label unconstrained,
//! - `a|b|c` inside one segment accepts any of the alternatives,
//! - a leading `^` makes the rest of the path optional. Each optional label
//!   matches its literal or absence, and absence cascades because a
//!   [`Location`] never has a present label after an absent one.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PathError;

/// The maximum allowed path depth.
pub const MAX_DEPTH: usize = 10;

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-]+$").expect("label pattern is a valid regex")
});

/// True if `label` is a legal path label.
pub fn valid_label(label: &str) -> bool {
    LABEL_RE.is_match(label)
}

/// Constraint on a single label position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "values")]
pub enum LabelConstraint {
    /// The label equals this literal.
    Equals(String),
    /// The label equals one of these literals.
    OneOf(Vec<String>),
    /// The label equals one of these literals or is absent.
    Optional(Vec<String>),
    /// The label is absent.
    Absent,
}

impl LabelConstraint {
    /// Check a label (or its absence) against this constraint.
    pub fn admits(&self, label: Option<&str>) -> bool {
        match (self, label) {
            (Self::Equals(expected), Some(label)) => expected == label,
            (Self::OneOf(values), Some(label)) => values.iter().any(|v| v == label),
            (Self::Optional(_), None) => true,
            (Self::Optional(values), Some(label)) => values.iter().any(|v| v == label),
            (Self::Absent, None) => true,
            _ => false,
        }
    }

    /// Literal values this constraint accepts, absence excluded.
    pub fn values(&self) -> &[String] {
        match self {
            Self::Equals(value) => std::slice::from_ref(value),
            Self::OneOf(values) | Self::Optional(values) => values,
            Self::Absent => &[],
        }
    }

    /// Whether absence satisfies this constraint.
    pub fn admits_absent(&self) -> bool {
        matches!(self, Self::Optional(_) | Self::Absent)
    }
}

/// Parse a path or pattern into per-position label constraints.
///
/// The result is fully constrained (every position up to and including the
/// first absent one) unless the path ends in `*`, in which case constraints
/// stop before the star. `allow_wildcard_suffix` gates the `*` terminator;
/// `|` and `^` are always accepted.
pub fn parse(path: &str, allow_wildcard_suffix: bool) -> Result<Vec<LabelConstraint>, PathError> {
    let err_path = || path.to_string();

    if path.is_empty() {
        return Err(PathError::Empty { path: err_path() });
    }

    let segments: Vec<&str> = path.split('.').collect();
    let last = segments.len() - 1;
    let open_suffix = segments[last] == "*";
    let label_count = if open_suffix { last } else { segments.len() };

    if label_count > MAX_DEPTH {
        return Err(PathError::TooDeep {
            path: err_path(),
            depth: label_count,
            max: MAX_DEPTH,
        });
    }

    let mut constraints = Vec::with_capacity(label_count + 1);
    let mut optional_part = false;

    for (index, raw) in segments.iter().enumerate() {
        if *raw == "*" {
            if !allow_wildcard_suffix || index != last {
                return Err(PathError::MisplacedWildcard { path: err_path() });
            }
            break;
        }
        if raw.contains('*') {
            return Err(PathError::MisplacedWildcard { path: err_path() });
        }

        let mut segment = *raw;
        if let Some(rest) = segment.strip_prefix('^') {
            if optional_part {
                return Err(PathError::MisplacedOptional { path: err_path() });
            }
            optional_part = true;
            segment = rest;
        }
        if segment.contains('^') {
            return Err(PathError::MisplacedOptional { path: err_path() });
        }

        if segment.is_empty() {
            let later_present = segments[index + 1..].iter().any(|s| !s.is_empty());
            return Err(if later_present {
                PathError::StrayGap {
                    path: err_path(),
                    index,
                }
            } else {
                PathError::EmptySegment {
                    path: err_path(),
                    index,
                }
            });
        }

        let mut alternatives = Vec::new();
        for alternative in segment.split('|') {
            if !valid_label(alternative) {
                return Err(PathError::InvalidLabel {
                    path: err_path(),
                    label: alternative.to_string(),
                });
            }
            alternatives.push(alternative.to_string());
        }

        let constraint = if optional_part {
            LabelConstraint::Optional(alternatives)
        } else if alternatives.len() > 1 {
            LabelConstraint::OneOf(alternatives)
        } else {
            LabelConstraint::Equals(alternatives.remove(0))
        };
        constraints.push(constraint);
    }

    if !open_suffix && constraints.len() < MAX_DEPTH {
        constraints.push(LabelConstraint::Absent);
    }

    Ok(constraints)
}

/// Join present labels with `.`, stopping at the first absent one.
pub fn format<S: AsRef<str>>(labels: &[Option<S>]) -> String {
    labels
        .iter()
        .map_while(|label| label.as_ref().map(|l| l.as_ref()))
        .collect::<Vec<_>>()
        .join(".")
}

/// Canonical label sequence for a concrete (non-wildcard) path.
///
/// `label(0)` is always present and absence only ever appears as a suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    labels: [Option<String>; MAX_DEPTH],
}

impl Location {
    /// Parse a concrete dotted path.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty {
                path: path.to_string(),
            });
        }
        let segments: Vec<&str> = path.split('.').collect();
        if segments.len() > MAX_DEPTH {
            return Err(PathError::TooDeep {
                path: path.to_string(),
                depth: segments.len(),
                max: MAX_DEPTH,
            });
        }

        let mut labels: [Option<String>; MAX_DEPTH] = Default::default();
        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                let later_present = segments[index + 1..].iter().any(|s| !s.is_empty());
                return Err(if later_present {
                    PathError::StrayGap {
                        path: path.to_string(),
                        index,
                    }
                } else {
                    PathError::EmptySegment {
                        path: path.to_string(),
                        index,
                    }
                });
            }
            if segment.contains('*') {
                return Err(PathError::MisplacedWildcard {
                    path: path.to_string(),
                });
            }
            if !valid_label(segment) {
                return Err(PathError::InvalidLabel {
                    path: path.to_string(),
                    label: segment.to_string(),
                });
            }
            labels[index] = Some(segment.to_string());
        }
        Ok(Self { labels })
    }

    /// Build a location from a full label tuple, rejecting stray gaps.
    pub fn from_labels(labels: [Option<String>; MAX_DEPTH]) -> Result<Self, PathError> {
        let rendered = labels
            .iter()
            .map(|l| l.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(".");

        if labels[0].is_none() {
            return Err(PathError::Empty { path: rendered });
        }

        let mut absent_seen = false;
        for (index, label) in labels.iter().enumerate() {
            match label {
                None => absent_seen = true,
                Some(_) if absent_seen => {
                    return Err(PathError::StrayGap {
                        path: rendered,
                        index,
                    })
                }
                Some(label) if !valid_label(label) => {
                    return Err(PathError::InvalidLabel {
                        path: rendered,
                        label: label.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(Self { labels })
    }

    /// Label at `index`, `None` when absent or out of range.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).and_then(|l| l.as_deref())
    }

    /// The full fixed-size label tuple.
    pub fn labels(&self) -> &[Option<String>; MAX_DEPTH] {
        &self.labels
    }

    /// Present labels in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map_while(|l| l.as_deref())
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    /// Dotted representation.
    pub fn path(&self) -> String {
        format(&self.labels)
    }

    /// True when `self` equals `ancestor` or lies below it.
    pub fn is_at_or_below(&self, ancestor: &Location) -> bool {
        let depth = ancestor.depth();
        depth <= self.depth() && (0..depth).all(|i| self.label(i) == ancestor.label(i))
    }

    /// Every prefix of this location, shallowest first, ending with itself.
    pub fn ancestors_and_self(&self) -> Vec<Location> {
        (1..=self.depth())
            .map(|depth| {
                let mut labels: [Option<String>; MAX_DEPTH] = Default::default();
                labels[..depth].clone_from_slice(&self.labels[..depth]);
                Self { labels }
            })
            .collect()
    }

    /// Exact constraints selecting exactly this location.
    pub fn constraints(&self) -> Vec<LabelConstraint> {
        let depth = self.depth();
        let mut constraints: Vec<LabelConstraint> = self
            .iter()
            .map(|l| LabelConstraint::Equals(l.to_string()))
            .collect();
        if depth < MAX_DEPTH {
            constraints.push(LabelConstraint::Absent);
        }
        constraints
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl FromStr for Location {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Location {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.path()
    }
}
