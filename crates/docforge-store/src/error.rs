use docforge_types::Identifier;

/// Errors from document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested document was not found.
    #[error("document not found in {kind}: {id}")]
    NotFound { kind: String, id: Identifier },

    /// A write would break a unique index.
    #[error("duplicate value for unique index {kind}.{field}: {value}")]
    DuplicateKey {
        kind: String,
        field: String,
        value: String,
    },

    /// The document cannot be stored or read back.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The backing store is unreachable or rejected the credentials.
    #[error("cannot connect to database {db} on {host}:{port}: {reason}")]
    ConnectionFailure {
        db: String,
        host: String,
        port: u16,
        reason: String,
    },

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
