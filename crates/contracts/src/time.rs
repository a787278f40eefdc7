//! Device timestamps

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four device counters returned by one SYSTIME reply.
///
/// All values are free-running 32-bit counters and wrap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSample {
    /// Counter at the moment the reply was produced
    pub current: u32,
    /// Start of the last transmission
    pub tx: u32,
    /// Detection of the last received signal
    pub rx: u32,
    /// Last external sync pulse
    pub syncin: u32,
}

impl TimeSample {
    pub fn new(current: u32, tx: u32, rx: u32, syncin: u32) -> Self {
        Self {
            current,
            tx,
            rx,
            syncin,
        }
    }
}

impl fmt::Display for TimeSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "current={} tx={} rx={} syncin={}",
            self.current, self.tx, self.rx, self.syncin
        )
    }
}
