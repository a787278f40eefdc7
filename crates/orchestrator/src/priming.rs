//! Receiver priming
//!
//! A modem only settles its gain control after it has been in receive state
//! once. Before the first round every session streams into memory for a
//! while and is then stopped.

use std::time::Duration;

use contracts::Transport;
use observability::ScenarioLogger;
use session::Session;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::error::{OrchestratorError, Result, SessionFailure};
use crate::phase::{InPhase, RoundPhase};

/// Arm an unsized receive on every session, let data flow for `duration`,
/// then stop each session and wait for its STOP.
#[instrument(name = "prime_receivers", skip(sessions, logger), fields(sessions = sessions.len(), duration_ms = duration.as_millis() as u64))]
pub async fn prime_receivers<T: Transport + 'static>(
    sessions: &mut Vec<Session<T>>,
    duration: Duration,
    logger: &ScenarioLogger,
) -> Result<()> {
    let mut failures = Vec::new();
    for session in sessions.iter_mut() {
        let id = session.id().clone();
        let armed = match session.add_sink_membuf().in_phase(&id, RoundPhase::Prime) {
            Ok(()) => session.send_rx(0).await.in_phase(&id, RoundPhase::Prime),
            Err(failure) => Err(failure),
        };
        if let Err(failure) = armed {
            failures.push(failure);
        }
    }
    if !failures.is_empty() {
        stop_all(sessions).await;
        return Err(OrchestratorError::PrimingFailed { failures });
    }

    logger.note(format_args!("priming receivers for {} ms", duration.as_millis()));
    let deadline = Instant::now() + duration;
    let handles: Vec<_> = sessions
        .drain(..)
        .map(|mut session| {
            let id = session.id().clone();
            let handle = tokio::spawn(async move {
                let result = session.receive_until(deadline).await;
                (session, result)
            });
            (id, handle)
        })
        .collect();

    let mut lost = None;
    for (id, handle) in handles {
        match handle.await {
            Ok((session, Ok(received))) => {
                info!(session = %id, received, "receiver primed");
                sessions.push(session);
            }
            Ok((session, Err(e))) => {
                failures.push(SessionFailure::new(&id, RoundPhase::Prime, e));
                sessions.push(session);
            }
            Err(e) => {
                warn!(session = %id, error = %e, "priming task lost its session");
                lost.get_or_insert(OrchestratorError::TaskJoin {
                    session: id,
                    message: e.to_string(),
                });
            }
        }
    }

    for session in sessions.iter_mut() {
        let id = session.id().clone();
        if let Err(failure) = session.send_stop().await.in_phase(&id, RoundPhase::Prime) {
            failures.push(failure);
        }
    }

    if let Some(err) = lost {
        return Err(err);
    }
    if !failures.is_empty() {
        return Err(OrchestratorError::PrimingFailed { failures });
    }
    Ok(())
}

async fn stop_all<T: Transport>(sessions: &mut [Session<T>]) {
    for session in sessions.iter_mut().filter(|s| s.is_receiving()) {
        session.abort().await;
    }
}
