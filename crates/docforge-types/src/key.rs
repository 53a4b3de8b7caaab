//! Property key validation.
//!
//! A key addresses a path in a [`PropertyTree`](crate::PropertyTree). Callers
//! present it either as a single dotted string (`"sample.origin.site"`) or as
//! an already-segmented sequence (`["sample", "origin", "site"]`).
//!
//! Valid keys:
//! - Contain at least one segment
//! - Contain no empty segment (so no leading, trailing or doubled separator)
//! - Use the reserved `_id` key only as the first segment

use std::fmt;

use crate::error::{TreeError, TreeResult};

/// Separator between segments of a dotted key.
pub const PATH_SEPARATOR: char = '.';

/// Reserved root key carrying the document identifier.
pub const ID_KEY: &str = "_id";

/// A validated, non-empty sequence of key segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// The path segments, root first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// First segment.
    pub fn root(&self) -> &str {
        &self.0[0]
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: validation rejects empty paths.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the path addresses the reserved identifier key.
    pub fn is_reserved_root(&self) -> bool {
        self.root() == ID_KEY
    }

    /// Render as a dotted string.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }

    /// Split into the parent segments and the terminal segment.
    pub fn split_last(&self) -> (&[String], &str) {
        let (last, parents) = self
            .0
            .split_last()
            .map(|(last, parents)| (last.as_str(), parents))
            .unwrap_or(("", &[]));
        (parents, last)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// Anything a caller may present as a property key.
pub trait IntoKeyPath {
    /// Raw, unvalidated segments.
    fn into_segments(self) -> Vec<String>;
}

impl IntoKeyPath for &str {
    fn into_segments(self) -> Vec<String> {
        self.split(PATH_SEPARATOR).map(str::to_string).collect()
    }
}

impl IntoKeyPath for String {
    fn into_segments(self) -> Vec<String> {
        self.as_str().into_segments()
    }
}

impl IntoKeyPath for &String {
    fn into_segments(self) -> Vec<String> {
        self.as_str().into_segments()
    }
}

impl IntoKeyPath for &[&str] {
    fn into_segments(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_string()).collect()
    }
}

impl<const N: usize> IntoKeyPath for [&str; N] {
    fn into_segments(self) -> Vec<String> {
        self.iter().map(|s| (*s).to_string()).collect()
    }
}

impl IntoKeyPath for Vec<&str> {
    fn into_segments(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoKeyPath for Vec<String> {
    fn into_segments(self) -> Vec<String> {
        self
    }
}

impl IntoKeyPath for &[String] {
    fn into_segments(self) -> Vec<String> {
        self.to_vec()
    }
}

impl IntoKeyPath for KeyPath {
    fn into_segments(self) -> Vec<String> {
        self.0
    }
}

impl IntoKeyPath for &KeyPath {
    fn into_segments(self) -> Vec<String> {
        self.0.clone()
    }
}

/// Validate a key, returning its segments.
///
/// # Examples
///
/// ```
/// use docforge_types::validate_key;
///
/// assert_eq!(validate_key("a.b").unwrap().len(), 2);
/// assert!(validate_key(["a", "b"]).is_ok());
/// assert!(validate_key("a..b").is_err());
/// assert!(validate_key("a._id").is_err());
/// ```
pub fn validate_key(key: impl IntoKeyPath) -> TreeResult<KeyPath> {
    let segments = key.into_segments();

    if segments.is_empty() {
        return Err(TreeError::InvalidKey {
            key: String::new(),
            reason: "key must have at least one segment".into(),
        });
    }

    for (position, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            return Err(TreeError::InvalidKey {
                key: segments.join("."),
                reason: format!("segment {position} is empty"),
            });
        }
        if position > 0 && segment == ID_KEY {
            return Err(TreeError::InvalidKey {
                key: segments.join("."),
                reason: format!("{ID_KEY:?} is only allowed at the root"),
            });
        }
    }

    Ok(KeyPath(segments))
}
