use std::fmt;
use std::str::FromStr;

use tracing::Level;

use crate::error::ConfigError;

/// How much diagnostic output to emit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verbosity {
    Debug,
    #[default]
    Warning,
    Error,
}

impl Verbosity {
    pub fn level(self) -> Level {
        match self {
            Self::Debug => Level::DEBUG,
            Self::Warning => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }
}

impl FromStr for Verbosity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidVerbosity(s.to_string())),
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Install a formatting subscriber at `verbosity`.
///
/// Returns `false` when a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_logging(verbosity: Verbosity) -> bool {
    let installed = tracing_subscriber::fmt()
        .with_max_level(verbosity.level())
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(%verbosity, "logging initialized");
    }
    installed
}

/// Only errors.
pub fn min_verbosity() -> bool {
    init_logging(Verbosity::Error)
}

/// Warnings and errors.
pub fn normal_verbosity() -> bool {
    init_logging(Verbosity::Warning)
}

/// Everything, down to debug events.
pub fn max_verbosity() -> bool {
    init_logging(Verbosity::Debug)
}
