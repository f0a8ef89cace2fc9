//! Tag normalization.
//!
//! Tags are the normalized source of truth. Any full-text index built from
//! them is an external concern.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static DELIMITERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\s]+").expect("delimiter pattern is a valid regex"));

static DECORATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\p{L}\p{N}]+|[^\p{L}\p{N}]+$").expect("decoration pattern is a valid regex")
});

/// Raw tag assignment: a list or a single delimited string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagInput {
    List(Vec<String>),
    Text(String),
}

impl From<&str> for TagInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TagInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for TagInput {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for TagInput {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TagInput {
    fn from(value: [&str; N]) -> Self {
        Self::List(value.iter().map(|s| s.to_string()).collect())
    }
}

/// Normalized, lowercase, deduplicated tags in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn normalize(input: impl Into<TagInput>) -> Self {
        let raw: Vec<String> = match input.into() {
            TagInput::List(items) => items,
            TagInput::Text(text) => vec![text],
        };

        let mut tags: Vec<String> = Vec::new();
        for item in &raw {
            for token in DELIMITERS.split(item) {
                let tag = DECORATION.replace_all(token, "").to_lowercase();
                if !tag.is_empty() && !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }
        Self(tags)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// AND semantics: every tag in `required` is present.
    pub fn contains_all(&self, required: &Tags) -> bool {
        required.0.iter().all(|t| self.contains(t))
    }
}

impl PartialEq<Vec<&str>> for Tags {
    fn eq(&self, other: &Vec<&str>) -> bool {
        self.0.len() == other.len() && self.0.iter().zip(other).all(|(a, b)| a == b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_is_normalized() {
        let tags = Tags::normalize(vec!["bing", "Bang!"]);
        assert_eq!(tags, vec!["bing", "bang"]);
    }

    #[test]
    fn test_delimited_string_is_split() {
        let tags = Tags::normalize("bing, padunk");
        assert_eq!(tags, vec!["bing", "padunk"]);
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let tags = Tags::normalize("Paris, france,PARIS  lyon");
        assert_eq!(tags, vec!["paris", "france", "lyon"]);
    }

    #[test]
    fn test_inner_punctuation_survives() {
        let tags = Tags::normalize(vec!["(rock-n-roll)"]);
        assert_eq!(tags, vec!["rock-n-roll"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(Tags::normalize("").is_empty());
        assert!(Tags::normalize(" ,!, ").is_empty());
        assert!(Tags::default().is_empty());
    }

    #[test]
    fn test_contains_all() {
        let tags = Tags::normalize(["france", "paris"]);
        assert!(tags.contains_all(&Tags::normalize("paris")));
        assert!(tags.contains_all(&Tags::normalize(["France", "paris"])));
        assert!(!tags.contains_all(&Tags::normalize(["france", "lyon"])));
        assert!(tags.contains_all(&Tags::default()));
    }

    #[test]
    fn test_tag_input_deserializes_either_shape() {
        let list: TagInput = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert!(matches!(list, TagInput::List(_)));
        let text: TagInput = serde_json::from_str(r#""a, b""#).unwrap();
        assert!(matches!(text, TagInput::Text(_)));
    }
}
