//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Hardware runs need a transport the binary does not ship
    #[error("no device transport available for session '{session}' at {host}: use --simulate or add a [simulation] section")]
    NoTransport { session: String, host: String },

    /// Ranging record could not be read or written
    #[error("ranging record {}: {message}", path.display())]
    RangingRecord { path: PathBuf, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn no_transport(session: impl Into<String>, host: impl Into<String>) -> Self {
        Self::NoTransport {
            session: session.into(),
            host: host.into(),
        }
    }

    pub fn ranging_record(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::RangingRecord {
            path: path.into(),
            message: message.into(),
        }
    }
}
