//! Foundation types for docforge.
//!
//! This crate provides the data structures shared by every other docforge
//! crate. None of them perform I/O.
//!
//! # Key Types
//!
//! - [`Identifier`]: 12-byte storage-assigned document identifier
//! - [`KeyPath`]: validated dotted or compound property key
//! - [`PropertyTree`]: nested key/value mapping addressed by key paths
//! - [`Query`]: structured document filter

pub mod error;
pub mod identifier;
pub mod key;
pub mod query;
pub mod tree;

pub use error::{TreeError, TreeResult, TypeError};
pub use identifier::{Identifier, IdentifierGenerator};
pub use key::{validate_key, IntoKeyPath, KeyPath, ID_KEY, PATH_SEPARATOR};
pub use query::Query;
pub use tree::PropertyTree;

/// Property value. Scalars, lists and nested trees are all JSON values.
pub type Value = serde_json::Value;

/// Raw JSON object, the serialized shape of a property tree.
pub type Map = serde_json::Map<String, Value>;
