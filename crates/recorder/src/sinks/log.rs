//! LogRecordSink - logs round records via tracing

use contracts::{ContractError, RecordSink, RoundReport};
use tracing::{info, instrument};

/// Sink that logs every record, for runs without file output
pub struct LogRecordSink {
    name: String,
}

impl LogRecordSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl RecordSink for LogRecordSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_record_sink_write",
        skip(self, report),
        fields(sink = %self.name, round = report.round)
    )]
    async fn write(&mut self, report: &RoundReport) -> Result<(), ContractError> {
        for record in &report.records {
            info!(
                sink = %self.name,
                round = report.round,
                session = %record.session,
                current = record.time.current,
                tx = record.time.tx,
                rx = record.time.rx,
                syncin = record.time.syncin,
                duration_ms = record.duration_ms,
                "Telemetry record"
            );
        }
        Ok(())
    }

    #[instrument(name = "log_record_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogRecordSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogRecordSink::new("log");
        let report = RoundReport {
            round: 1,
            dir: PathBuf::from("unused"),
            records: vec![],
        };
        assert!(sink.write(&report).await.is_ok());
        assert!(sink.close().await.is_ok());
    }
}
