//! Rewards Tree Logging
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` takes precedence
//! over the configured level when it is set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
    #[error("unknown log level: {0}")]
    UnknownLevel(String),
}

pub type Result<T> = std::result::Result<T, LoggingError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// `Debug` when verbose, `Info` otherwise.
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Self::Debug
        } else {
            Self::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Filter used when `RUST_LOG` is unset or invalid.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.as_str()))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(LoggingError::UnknownLevel(s.to_string())),
        }
    }
}

/// Install the fmt subscriber at `level`.
///
/// Returns `AlreadyInitialized` if any global subscriber is already set.
pub fn try_init(level: LogLevel) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(level.filter())
        .with_target(true)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}

/// Like [`try_init`], ignoring an already installed subscriber.
pub fn init(level: LogLevel) {
    let _ = try_init(level);
}
