//! UID codec: `<kind>:<dotted-path>$<object-id>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GroveError, GroveResult, ValidationError};
use crate::path::{valid_label, Location};
use crate::wildcard::WildcardPath;

fn invalid(uid: &str, reason: &str) -> GroveError {
    GroveError::Validation(ValidationError::InvalidUid {
        uid: uid.to_string(),
        reason: reason.to_string(),
    })
}

/// Split into `(kind, path, oid)`: first `:` then last `$`.
fn split(uid: &str) -> GroveResult<(&str, &str, Option<&str>)> {
    let (kind, rest) = uid
        .split_once(':')
        .ok_or_else(|| invalid(uid, "missing ':' after kind"))?;
    match rest.rsplit_once('$') {
        Some((path, oid)) => Ok((kind, path, Some(oid))),
        None => Ok((kind, rest, None)),
    }
}

/// A concrete, fully specified UID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid {
    kind: String,
    location: Location,
    oid: String,
}

impl Uid {
    pub fn new(kind: &str, path: &str, oid: &str) -> GroveResult<Self> {
        let rendered = format!("{}:{}${}", kind, path, oid);
        if !valid_label(kind) {
            return Err(invalid(&rendered, "kind must be a plain label"));
        }
        if oid.is_empty() || oid.contains('$') {
            return Err(invalid(&rendered, "object id must be non-empty and free of '$'"));
        }
        let location = Location::parse(path)?;
        Ok(Self {
            kind: kind.to_string(),
            location,
            oid: oid.to_string(),
        })
    }

    /// Assemble from already validated parts.
    pub(crate) fn from_parts(kind: &str, location: &Location, oid: String) -> Self {
        Self {
            kind: kind.to_string(),
            location: location.clone(),
            oid,
        }
    }

    pub fn parse(uid: &str) -> GroveResult<Self> {
        let (kind, path, oid) = split(uid)?;
        let oid = oid.ok_or_else(|| invalid(uid, "missing '$' before object id"))?;
        Self::new(kind, path, oid)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn path(&self) -> String {
        self.location.path()
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// `realm` is the first path label.
    pub fn realm(&self) -> Option<&str> {
        self.location.label(0)
    }

    pub fn box_name(&self) -> Option<&str> {
        self.location.label(1)
    }

    pub fn collection(&self) -> Option<&str> {
        self.location.label(2)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}${}", self.kind, self.location, self.oid)
    }
}

impl FromStr for Uid {
    type Err = GroveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Uid {
    type Error = GroveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> Self {
        uid.to_string()
    }
}

/// A UID pattern used for bulk lookup.
///
/// `*` as the kind or oid means any; a missing `$oid` also means any oid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardUid {
    kind: Option<String>,
    path: WildcardPath,
    oid: Option<String>,
}

impl WildcardUid {
    pub fn parse(pattern: &str) -> GroveResult<Self> {
        let (kind, path, oid) = split(pattern)?;
        let kind = match kind {
            "*" => None,
            k if valid_label(k) => Some(k.to_string()),
            _ => return Err(invalid(pattern, "kind must be a plain label or '*'")),
        };
        let oid = match oid {
            None | Some("*") => None,
            Some("") => return Err(invalid(pattern, "object id must not be empty")),
            Some(oid) => Some(oid.to_string()),
        };
        Ok(Self {
            kind,
            path: WildcardPath::compile(path)?,
            oid,
        })
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn path(&self) -> &WildcardPath {
        &self.path
    }

    pub fn oid(&self) -> Option<&str> {
        self.oid.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uid() {
        let uid = Uid::parse("post:area51.vaktmesterkontoret.forum1$name").unwrap();
        assert_eq!(uid.kind(), "post");
        assert_eq!(uid.realm(), Some("area51"));
        assert_eq!(uid.box_name(), Some("vaktmesterkontoret"));
        assert_eq!(uid.collection(), Some("forum1"));
        assert_eq!(uid.oid(), "name");
        assert_eq!(uid.to_string(), "post:area51.vaktmesterkontoret.forum1$name");
    }

    #[test]
    fn test_uid_splits_on_last_dollar() {
        assert!(Uid::parse("post:a.b$c$d").is_err());
        let uid = Uid::parse("post:a.b$doc-1").unwrap();
        assert_eq!(uid.oid(), "doc-1");
    }

    #[test]
    fn test_uid_rejects_malformed() {
        assert!(Uid::parse("area51.box$name").is_err());
        assert!(Uid::parse("post:area51.box").is_err());
        assert!(Uid::parse("post:area51..box$x").unwrap_err().is_invalid_path());
        assert!(Uid::parse("post:a.*$x").is_err());
        assert!(Uid::parse(":a$x").is_err());
        assert!(Uid::parse("post:a$").is_err());
    }

    #[test]
    fn test_wildcard_uid() {
        let pattern = WildcardUid::parse("post:*$doc1").unwrap();
        assert_eq!(pattern.kind(), Some("post"));
        assert_eq!(pattern.oid(), Some("doc1"));
        assert!(pattern.path().matches_path("x.y"));

        let pattern = WildcardUid::parse("post:area51.*").unwrap();
        assert_eq!(pattern.oid(), None);
        assert!(pattern.path().matches_path("area51.box"));

        let pattern = WildcardUid::parse("*:a.b$*").unwrap();
        assert_eq!(pattern.kind(), None);
        assert_eq!(pattern.oid(), None);
    }

    #[test]
    fn test_wildcard_uid_rejects_bad_pattern() {
        assert!(WildcardUid::parse("post:a.*.b").unwrap_err().is_invalid_path());
        assert!(WildcardUid::parse("post").is_err());
    }
}
