//! Round phases

use std::fmt;

use contracts::SessionId;

use crate::error::SessionFailure;

/// Steps a session goes through in one synchronization round.
///
/// `Prime` is only used by receiver priming before the first round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundPhase {
    Configure,
    ArmNoiseThreshold,
    WaitSyncEvent,
    TransmitSignal,
    ArmReceive,
    WaitData,
    CollectUsbl,
    FetchSystime,
    Persist,
    Prime,
}

impl RoundPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundPhase::Configure => "configure",
            RoundPhase::ArmNoiseThreshold => "arm_noise_threshold",
            RoundPhase::WaitSyncEvent => "wait_sync_event",
            RoundPhase::TransmitSignal => "transmit_signal",
            RoundPhase::ArmReceive => "arm_receive",
            RoundPhase::WaitData => "wait_data",
            RoundPhase::CollectUsbl => "collect_usbl",
            RoundPhase::FetchSystime => "fetch_systime",
            RoundPhase::Persist => "persist",
            RoundPhase::Prime => "prime",
        }
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags a session result with the phase it belongs to.
pub(crate) trait InPhase<T> {
    fn in_phase(self, session: &SessionId, phase: RoundPhase) -> Result<T, SessionFailure>;
}

impl<T> InPhase<T> for session::Result<T> {
    fn in_phase(self, session: &SessionId, phase: RoundPhase) -> Result<T, SessionFailure> {
        self.map_err(|source| SessionFailure::new(session, phase, source))
    }
}
