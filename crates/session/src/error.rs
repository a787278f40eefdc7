//! Session error types

use contracts::{ContractError, ReportKind, SessionId};
use thiserror::Error;

/// Session specific error
#[derive(Debug, Error)]
pub enum SessionError {
    /// No matching reply before the deadline
    #[error("session '{session}': timed out after {waited_ms} ms waiting for {expected}")]
    Timeout {
        session: SessionId,
        expected: String,
        waited_ms: u64,
    },

    /// A reply arrived that does not answer the pending command
    #[error("session '{session}': expected {expected}, received {received}")]
    ProtocolMismatch {
        session: SessionId,
        expected: String,
        received: String,
    },

    /// Operation not allowed in the current session state
    #[error("session '{session}': invalid state: {message}")]
    InvalidState { session: SessionId, message: String },

    /// Device answered BUSY
    #[error("session '{session}': device busy (param {param})")]
    DeviceBusy { session: SessionId, param: u16 },

    /// Device acknowledged with a failure status
    #[error("session '{session}': device rejected {report}")]
    CommandRejected {
        session: SessionId,
        report: ReportKind,
    },

    /// Transport closed while waiting
    #[error("session '{session}': connection closed")]
    ConnectionClosed { session: SessionId },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl SessionError {
    /// Create invalid state error
    pub fn invalid_state(session: &SessionId, message: impl Into<String>) -> Self {
        Self::InvalidState {
            session: session.clone(),
            message: message.into(),
        }
    }

    /// Create protocol mismatch error
    pub fn mismatch(
        session: &SessionId,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) -> Self {
        Self::ProtocolMismatch {
            session: session.clone(),
            expected: expected.into(),
            received: received.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SessionError>;
