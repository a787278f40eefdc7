//! Recorder error types

use thiserror::Error;

/// Recorder-specific errors
#[derive(Debug, Error)]
pub enum RecordError {
    /// Round directory could not be created
    #[error("failed to create round directory '{path}': {message}")]
    RoundDirectory { path: String, message: String },

    /// Sink creation error
    #[error("failed to create record sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Sink write error (from contract)
    #[error("record sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecordError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
