//! Object-document mapping over schemaless document stores.
//!
//! This is the main entry point for applications using docforge. A
//! [`Session`] connects to a store, owns the identity cache and hands out
//! [`Document`]s: in-memory objects with nested properties that commit to
//! storage, and that can be linked by relationship documents and traversed
//! as a directed graph.
//!
//! ```no_run
//! use docforge::{ConnectionParams, InMemoryConnector, Session};
//!
//! let connector = InMemoryConnector::new();
//! let session = Session::connect(ConnectionParams::default(), None, &connector)?;
//! let sample = session.create("Sample", serde_json::Map::new())?;
//! sample.set("origin.site", "A")?;
//! sample.commit_default()?;
//! # Ok::<(), docforge::DocforgeError>(())
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use config::{default_config_path, load_config_file, ConfigFile, ConnectionParams, LoggingSection};
pub use error::{ConfigError, DocforgeError, DocforgeResult};
pub use logging::{init_logging, max_verbosity, min_verbosity, normal_verbosity, Verbosity};
pub use session::Session;

// Re-export key types
pub use docforge_forge::{
    Direction, Document, Forge, ForgeError, ForgeResult, Relationship, RELATIONSHIP_KIND,
};
pub use docforge_store::{
    ConnectionConfig, Connector, DocumentStore, InMemoryConnector, InMemoryDocumentStore,
    IndexSpec, Indices, StoreError,
};
pub use docforge_types::{validate_key, Identifier, KeyPath, Map, PropertyTree, Query, Value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
