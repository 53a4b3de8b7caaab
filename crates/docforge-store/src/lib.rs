//! Document storage for docforge.
//!
//! The object layer never talks to a database directly. It goes through the
//! [`DocumentStore`] trait, obtained from a [`Connector`] for a given
//! [`ConnectionConfig`]. The store owns the persisted layout; callers only
//! see raw documents whose top-level `_id` carries the [`Identifier`].
//!
//! # Storage Backends
//!
//! - [`InMemoryDocumentStore`]: `RwLock`-guarded collections for tests and embedding
//! - [`InMemoryConnector`]: hosts named in-memory databases behind connection configs
//!
//! # Design Rules
//!
//! 1. Storage is the source of truth for existence.
//! 2. Every call is synchronous request/response; no retry happens here.
//! 3. Connection failures surface immediately as [`StoreError::ConnectionFailure`].
//!
//! [`Identifier`]: docforge_types::Identifier

pub mod config;
pub mod connector;
pub mod error;
pub mod memory;
pub mod traits;

pub use config::ConnectionConfig;
pub use connector::InMemoryConnector;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryDocumentStore;
pub use traits::{Connector, DocumentStore, IndexSpec, Indices, RawDocument};
