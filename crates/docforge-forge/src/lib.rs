//! Object identity and persistence for docforge.
//!
//! A [`Document`] is an in-memory object of some kind carrying a property
//! tree. The [`Forge`] is the single authority between documents and the
//! document store: it writes commits through, loads query results, and keeps
//! a weak identity cache so that at most one live `Document` exists per
//! persisted identifier. [`Relationship`] documents link two documents and
//! are traversed as a directed graph with [`Document::neighbors`].
//!
//! # Lock Ordering
//!
//! A document's state lock is always taken before the forge's cache lock,
//! and no `Arc<Document>` is released while the cache lock is held: the drop
//! hook of a committed document takes that lock to evict its entry.

pub mod error;
pub mod forge;
pub mod object;
pub mod relationship;

pub use error::{ForgeError, ForgeResult};
pub use forge::Forge;
pub use object::Document;
pub use relationship::{Direction, Relationship, RELATIONSHIP_KIND};

pub use docforge_store::{IndexSpec, Indices};
pub use docforge_types::{Identifier, KeyPath, Map, PropertyTree, Query, Value};
