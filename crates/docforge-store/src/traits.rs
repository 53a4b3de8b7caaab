use std::collections::BTreeMap;
use std::sync::Arc;

use docforge_types::{Identifier, Query, Value};
use serde::{Deserialize, Serialize};

use crate::config::ConnectionConfig;
use crate::error::StoreResult;

/// A stored document: a JSON object whose top-level `_id` is the identifier.
pub type RawDocument = serde_json::Map<String, Value>;

/// Index declaration for one dotted field path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Whether the indexed values must be unique within the kind.
    pub unique: bool,
}

impl IndexSpec {
    pub const fn unique() -> Self {
        Self { unique: true }
    }

    pub const fn non_unique() -> Self {
        Self { unique: false }
    }
}

/// Indices declared for a kind, keyed by dotted field path.
pub type Indices = BTreeMap<String, IndexSpec>;

/// Schemaless document storage, partitioned by kind.
///
/// All implementations must satisfy these invariants:
/// - Identifiers are assigned by the store on insert and never reused.
/// - Documents returned by `find` carry their identifier under `_id`.
/// - Results come back in identifier order.
/// - Errors are propagated, never silently ignored or retried.
pub trait DocumentStore: Send + Sync {
    /// All documents of `kind` matching `query`.
    fn find(&self, kind: &str, query: &Query) -> StoreResult<Vec<RawDocument>>;

    /// First document of `kind` matching `query`.
    fn find_one(&self, kind: &str, query: &Query) -> StoreResult<Option<RawDocument>> {
        Ok(self.find(kind, query)?.into_iter().next())
    }

    /// Store a new document and return its freshly assigned identifier.
    ///
    /// `indices` are registered before the write, as with `ensure_indices`.
    /// Any `_id` already present in `document` is replaced.
    fn insert(&self, kind: &str, document: RawDocument, indices: &Indices)
        -> StoreResult<Identifier>;

    /// Write `document` under an existing identifier.
    ///
    /// Save semantics: the document is written even if nothing is currently
    /// stored under `id`.
    fn update(&self, kind: &str, id: Identifier, document: RawDocument) -> StoreResult<()>;

    /// Delete one document. Returns `true` if it existed.
    fn remove(&self, kind: &str, id: Identifier) -> StoreResult<bool>;

    /// Delete every document of `kind`. Returns how many were removed.
    fn remove_all(&self, kind: &str) -> StoreResult<usize>;

    /// Number of documents of `kind` matching `query`.
    fn count(&self, kind: &str, query: &Query) -> StoreResult<u64> {
        Ok(self.find(kind, query)?.len() as u64)
    }

    /// Distinct values of `field` across `kind`, with how many documents
    /// hold each value.
    fn distinct(&self, kind: &str, field: &str) -> StoreResult<Vec<(Value, u64)>>;

    /// Whether any kind holds a document with this identifier.
    fn exists(&self, id: Identifier) -> StoreResult<bool>;

    /// Register indices for `kind`. Idempotent.
    fn ensure_indices(&self, kind: &str, indices: &Indices) -> StoreResult<()>;
}

/// Opens document stores for connection configurations.
///
/// This is the seam to the network/session layer: implementations resolve
/// the host, authenticate and hand back a ready store.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ConnectionConfig) -> StoreResult<Arc<dyn DocumentStore>>;
}
