use docforge_store::StoreError;
use docforge_types::{TreeError, TypeError};
use thiserror::Error;

/// Errors raised by documents, the forge and relationship traversal.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// A key path segment is malformed.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Read or delete of a path that does not exist.
    #[error("missing key: {0}")]
    MissingKey(String),

    /// Attempt to modify `_id` through the property interface.
    #[error("the property '_id' cannot be modified")]
    ReservedKey,

    /// The operation needs an identifier the document does not have.
    #[error("document has not been committed")]
    UncommittedObject,

    /// Malformed or unknown identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The backing store is unreachable or rejected the credentials.
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// Any other storage failure.
    #[error("store error: {0}")]
    Store(StoreError),

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<TreeError> for ForgeError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::InvalidKey { key, reason } => Self::InvalidKey { key, reason },
            TreeError::MissingKey(key) => Self::MissingKey(key),
        }
    }
}

impl From<TypeError> for ForgeError {
    fn from(err: TypeError) -> Self {
        Self::InvalidIdentifier(err.to_string())
    }
}

impl From<StoreError> for ForgeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConnectionFailure { .. } => Self::ConnectionFailure(err.to_string()),
            other => Self::Store(other),
        }
    }
}

/// Result alias for forge operations.
pub type ForgeResult<T> = Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_errors_keep_their_meaning() {
        let err: ForgeError = TreeError::MissingKey("a.b".into()).into();
        assert!(matches!(err, ForgeError::MissingKey(k) if k == "a.b"));
    }

    #[test]
    fn connection_failures_are_lifted() {
        let err: ForgeError = StoreError::ConnectionFailure {
            db: "d".into(),
            host: "h".into(),
            port: 1,
            reason: "down".into(),
        }
        .into();
        assert!(matches!(err, ForgeError::ConnectionFailure(_)));

        let err: ForgeError = StoreError::InvalidDocument("x".into()).into();
        assert!(matches!(err, ForgeError::Store(_)));
    }
}
