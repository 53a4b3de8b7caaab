use thiserror::Error;

/// Errors produced by identifier parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("value cannot be read as an identifier: {0}")]
    NotAnIdentifier(String),
}

/// Errors produced by key validation and property tree access.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// A key path segment is malformed.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The addressed path does not exist in the tree.
    #[error("missing key: {0}")]
    MissingKey(String),
}

/// Result alias for property tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
