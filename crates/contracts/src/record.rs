//! Telemetry records and the RecordSink trait
//!
//! A record holds the counters fetched from one session at the end of a
//! round. Its text form is one line: `name;current;tx;rx;syncin;duration_ms`.

use std::fmt;
use std::path::PathBuf;

use crate::{ContractError, SessionId, TimeSample};

/// Counters of one session for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub session: SessionId,
    pub time: TimeSample,
    /// Active session only: transmit start to receive start, in milliseconds
    pub duration_ms: u32,
}

impl TelemetryRecord {
    pub fn active(session: SessionId, time: TimeSample) -> Self {
        Self {
            session,
            duration_ms: time.rx.wrapping_sub(time.tx) / 1000,
            time,
        }
    }

    pub fn passive(session: SessionId, time: TimeSample) -> Self {
        Self {
            session,
            time,
            duration_ms: 0,
        }
    }

    pub fn to_line(&self) -> String {
        self.to_string()
    }

    /// Parse the single-line text form.
    pub fn parse(line: &str) -> Result<Self, ContractError> {
        let fields: Vec<&str> = line.trim().split(';').collect();
        if fields.len() != 6 {
            return Err(ContractError::config_parse(format!(
                "telemetry record needs 6 fields, got {}: '{}'",
                fields.len(),
                line.trim()
            )));
        }
        let number = |index: usize, field: &str| {
            fields[index].trim().parse::<u32>().map_err(|e| {
                ContractError::config_parse(format!("telemetry field '{}': {}", field, e))
            })
        };
        Ok(Self {
            session: SessionId::new(fields[0].trim()),
            time: TimeSample {
                current: number(1, "current")?,
                tx: number(2, "tx")?,
                rx: number(3, "rx")?,
                syncin: number(4, "syncin")?,
            },
            duration_ms: number(5, "duration")?,
        })
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{};{};{}",
            self.session,
            self.time.current,
            self.time.tx,
            self.time.rx,
            self.time.syncin,
            self.duration_ms
        )
    }
}

/// Everything persisted for one successful round.
#[derive(Debug, Clone)]
pub struct RoundReport {
    /// 1-based round number
    pub round: u32,
    /// Timestamped directory holding the round's sample files
    pub dir: PathBuf,
    pub records: Vec<TelemetryRecord>,
}

/// Telemetry output trait
#[trait_variant::make(RecordSink: Send)]
pub trait LocalRecordSink {
    /// Sink name (used for logging)
    fn name(&self) -> &str;

    /// Persist the records of one round
    async fn write(&mut self, report: &RoundReport) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_duration() {
        let record = TelemetryRecord::active("a".into(), TimeSample::new(9, 1_000, 251_999, 5));
        assert_eq!(record.duration_ms, 250);
        assert_eq!(record.to_line(), "a;9;1000;251999;5;250");
    }

    #[test]
    fn test_active_duration_across_wrap() {
        let record = TelemetryRecord::active("a".into(), TimeSample::new(0, u32::MAX - 999, 1_000, 0));
        assert_eq!(record.duration_ms, 2);
    }

    #[test]
    fn test_parse() {
        let record = TelemetryRecord::parse("p1;1;2;3;4;0\n").unwrap();
        assert_eq!(record.session, "p1");
        assert_eq!(record.time, TimeSample::new(1, 2, 3, 4));
        assert_eq!(record.duration_ms, 0);

        assert!(TelemetryRecord::parse("p1;1;2;3").is_err());
        assert!(TelemetryRecord::parse("p1;1;2;x;4;0").is_err());
    }
}
