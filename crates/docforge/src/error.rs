use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown verbosity level {0:?} (expected debug, warning or error)")]
    InvalidVerbosity(String),
}

#[derive(Debug, Error)]
pub enum DocforgeError {
    #[error(transparent)]
    Forge(#[from] docforge_forge::ForgeError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<docforge_store::StoreError> for DocforgeError {
    fn from(err: docforge_store::StoreError) -> Self {
        Self::Forge(err.into())
    }
}

pub type DocforgeResult<T> = Result<T, DocforgeError>;
