//! Orchestrator error types

use contracts::SessionId;
use ranging::RangingError;
use recorder::RecordError;
use session::SessionError;
use thiserror::Error;

use crate::phase::RoundPhase;

/// One session failing in one phase.
#[derive(Debug, Error)]
#[error("{session} failed in {phase}: {source}")]
pub struct SessionFailure {
    pub session: SessionId,
    pub phase: RoundPhase,
    #[source]
    pub source: SessionError,
}

impl SessionFailure {
    pub fn new(session: &SessionId, phase: RoundPhase, source: SessionError) -> Self {
        Self {
            session: session.clone(),
            phase,
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid session setup: {message}")]
    Setup { message: String },

    #[error(transparent)]
    Session(#[from] SessionFailure),

    #[error("Round {round} failed: {}", join_failures(failures))]
    RoundFailed {
        round: u32,
        failures: Vec<SessionFailure>,
    },

    #[error("Receiver priming failed: {}", join_failures(failures))]
    PrimingFailed { failures: Vec<SessionFailure> },

    #[error("Task of session {session} did not finish: {message}")]
    TaskJoin { session: SessionId, message: String },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Ranging(#[from] RangingError),
}

impl OrchestratorError {
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    /// Sessions named by this error
    pub fn failed_sessions(&self) -> Vec<SessionId> {
        match self {
            Self::Session(failure) => vec![failure.session.clone()],
            Self::RoundFailed { failures, .. } | Self::PrimingFailed { failures } => {
                failures.iter().map(|f| f.session.clone()).collect()
            }
            Self::TaskJoin { session, .. } => vec![session.clone()],
            _ => Vec::new(),
        }
    }
}

fn join_failures(failures: &[SessionFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_failure_lists_sessions() {
        let p1 = SessionId::new("p1");
        let err = OrchestratorError::RoundFailed {
            round: 2,
            failures: vec![SessionFailure::new(
                &p1,
                RoundPhase::WaitData,
                SessionError::ConnectionClosed {
                    session: p1.clone(),
                },
            )],
        };
        let text = err.to_string();
        assert!(text.starts_with("Round 2 failed: p1 failed in wait_data"));
        assert_eq!(err.failed_sessions(), vec![p1]);
    }
}
