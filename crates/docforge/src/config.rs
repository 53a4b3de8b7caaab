//! Connection parameters and the configuration file.
//!
//! Each connection parameter is resolved on its own: a value passed
//! explicitly wins, then the value from the `[connection]` section of the
//! configuration file, then the built-in default.
//!
//! ```toml
//! [connection]
//! host = "db.example.org"
//! port = 27018
//! db = "samples"
//! user = "alice"
//! password = "secret"
//!
//! [logging]
//! verbosity = "debug"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use docforge_store::config::{DEFAULT_DB, DEFAULT_HOST, DEFAULT_PORT};
use docforge_store::ConnectionConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::logging::Verbosity;

/// File name looked up in the home directory.
pub const CONFIG_FILE_NAME: &str = ".docforge.toml";

/// Connection parameters that may each be left unset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub verbosity: Option<String>,
}

/// Contents of a configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub connection: ConnectionParams,
    pub logging: LoggingSection,
}

impl ConfigFile {
    /// The configured verbosity, if the file sets one.
    pub fn verbosity(&self) -> Result<Option<Verbosity>, ConfigError> {
        self.logging
            .verbosity
            .as_deref()
            .map(str::parse)
            .transpose()
    }
}

/// `$HOME/.docforge.toml`, when a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME))
}

/// Read a configuration file. A missing file is not an error.
pub fn load_config_file(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no configuration file");
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let file = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "configuration file loaded");
    Ok(Some(file))
}

impl ConnectionParams {
    /// Fill unset parameters from `file`, then from the defaults.
    pub fn resolve(self, file: Option<&ConfigFile>) -> ConnectionConfig {
        let from_file = file.map(|f| f.connection.clone()).unwrap_or_default();

        ConnectionConfig {
            host: pick("host", self.host, from_file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: pick("port", self.port, from_file.port).unwrap_or(DEFAULT_PORT),
            db: pick("db", self.db, from_file.db).unwrap_or_else(|| DEFAULT_DB.to_string()),
            user: pick("user", self.user, from_file.user),
            password: pick("password", self.password, from_file.password),
        }
    }
}

fn pick<T>(key: &str, explicit: Option<T>, from_file: Option<T>) -> Option<T> {
    if explicit.is_some() {
        debug!(key, "connection parameter given explicitly");
        explicit
    } else if from_file.is_some() {
        debug!(key, "connection parameter read from configuration file");
        from_file
    } else {
        debug!(key, "connection parameter set to default");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_file() {
        let config = ConnectionParams::default().resolve(None);
        assert_eq!(config, ConnectionConfig::default());
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config_file(&dir.path().join("absent.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let file = write_config("[connection\nhost = ");
        let err = load_config_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let file = write_config("[connection]\nport = \"not a number\"\n");
        assert!(matches!(
            load_config_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn explicit_beats_file_beats_default() {
        let file = write_config(
            "[connection]\nhost = \"filehost\"\nport = 27018\nuser = \"alice\"\n",
        );
        let loaded = load_config_file(file.path()).unwrap().unwrap();

        let params = ConnectionParams {
            host: Some("cli".into()),
            ..ConnectionParams::default()
        };
        let config = params.resolve(Some(&loaded));
        assert_eq!(config.host, "cli");
        assert_eq!(config.port, 27018);
        assert_eq!(config.db, DEFAULT_DB);
        assert_eq!(config.user.as_deref(), Some("alice"));
        assert!(config.password.is_none());
        assert_eq!(config.url(), "alice@cli:27018/docforge");
    }

    #[test]
    fn logging_section() {
        let file = write_config("[logging]\nverbosity = \"DEBUG\"\n");
        let loaded = load_config_file(file.path()).unwrap().unwrap();
        assert_eq!(loaded.verbosity().unwrap(), Some(Verbosity::Debug));
        assert_eq!(loaded.connection, ConnectionParams::default());

        let file = write_config("[logging]\nverbosity = \"chatty\"\n");
        let loaded = load_config_file(file.path()).unwrap().unwrap();
        assert!(loaded.verbosity().is_err());
    }

    #[test]
    fn default_path_ends_with_file_name() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with(CONFIG_FILE_NAME));
        }
    }
}
