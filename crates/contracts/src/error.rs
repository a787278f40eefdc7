//! Layered error definitions
//!
//! Categorized by source: config / parameter / connection / stream

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Command Errors =====
    /// Command parameter outside the range the device accepts
    #[error("invalid parameter '{field}': {message}")]
    InvalidParameter { field: String, message: String },

    // ===== Connection Errors =====
    /// Transport could not be established
    #[error("connection to {peer} failed: {message}")]
    Connection { peer: String, message: String },

    /// Peer closed the connection
    #[error("connection to {peer} closed")]
    ConnectionClosed { peer: String },

    // ===== Sample Stream Errors =====
    /// Sample file could not be read or written
    #[error("sample stream '{path}': {message}")]
    Stream { path: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid parameter error
    pub fn invalid_parameter(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create connection error
    pub fn connection(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            peer: peer.into(),
            message: message.into(),
        }
    }

    /// Create sample stream error
    pub fn stream(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stream {
            path: path.into(),
            message: message.into(),
        }
    }
}
