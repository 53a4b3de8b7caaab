//! Structured document filters.
//!
//! A [`Query`] is a nested key/value mapping. Nested objects are flattened to
//! dotted paths before matching, so `{"sample": {"site": "A"}}` and
//! `{"sample.site": "A"}` select the same documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifier::Identifier;
use crate::key::ID_KEY;
use crate::tree::flatten;
use crate::Map;

/// A document filter. The empty query matches every document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    filter: Map,
}

impl Query {
    /// The empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing nested mapping.
    pub fn from_map(filter: Map) -> Self {
        Self { filter }
    }

    /// Add an equality condition on a dotted path.
    pub fn eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(path.into(), value.into());
        self
    }

    /// Restrict the query to one identifier.
    pub fn with_identifier(self, id: Identifier) -> Self {
        self.eq(ID_KEY, id.to_value())
    }

    /// Combine two queries. Conditions of `other` win on conflicting paths.
    pub fn merge(&self, other: &Query) -> Query {
        let mut merged: Map = self
            .conditions()
            .into_iter()
            .map(|(path, value)| (path, value.clone()))
            .collect();
        for (path, value) in other.conditions() {
            merged.insert(path, value.clone());
        }
        Query { filter: merged }
    }

    /// Returns `true` if the query has no condition.
    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
    }

    /// Borrow the raw filter mapping.
    pub fn as_map(&self) -> &Map {
        &self.filter
    }

    /// Flattened `(dotted path, expected value)` conditions.
    pub fn conditions(&self) -> Vec<(String, &Value)> {
        flatten(&self.filter)
    }

    /// Whether a raw document satisfies every condition.
    ///
    /// A condition holds when the value at its path equals the expected
    /// value, or when that value is a list containing the expected value.
    pub fn matches(&self, document: &Map) -> bool {
        self.conditions().into_iter().all(|(path, expected)| {
            match lookup(document, &path) {
                Some(actual) if actual == expected => true,
                Some(Value::Array(items)) => items.contains(expected),
                _ => false,
            }
        })
    }
}

impl From<Map> for Query {
    fn from(filter: Map) -> Self {
        Self::from_map(filter)
    }
}

/// Resolve a dotted path inside a raw document.
pub fn lookup<'a>(document: &'a Map, dotted: &str) -> Option<&'a Value> {
    let mut segments = dotted.split('.');
    let first = segments.next()?;
    let mut current = document.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
