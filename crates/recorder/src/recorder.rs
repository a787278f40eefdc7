//! Recorder - owns the output root and fans round reports out to record sinks

use std::path::{Path, PathBuf};

use chrono::Local;
use contracts::{
    ContractError, RecordSink, RecordSinkConfig, RecordSinkType, RoundReport, TelemetryRecord,
};
use tracing::{info, instrument, warn};

use crate::error::RecordError;
use crate::layout::RoundLayout;
use crate::sinks::{FileRecordSink, LogRecordSink};

/// Closed set of record sinks
pub enum AnyRecordSink {
    File(FileRecordSink),
    Log(LogRecordSink),
}

impl AnyRecordSink {
    /// Build a sink from its configuration entry
    pub fn from_config(config: &RecordSinkConfig) -> Result<Self, RecordError> {
        match config.sink_type {
            RecordSinkType::File => FileRecordSink::from_params(&config.name, &config.params)
                .map(AnyRecordSink::File)
                .map_err(|e| RecordError::sink_creation(&config.name, e.to_string())),
            RecordSinkType::Log => Ok(AnyRecordSink::Log(LogRecordSink::new(&config.name))),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AnyRecordSink::File(sink) => sink.name(),
            AnyRecordSink::Log(sink) => sink.name(),
        }
    }

    async fn write(&mut self, report: &RoundReport) -> Result<(), ContractError> {
        match self {
            AnyRecordSink::File(sink) => sink.write(report).await,
            AnyRecordSink::Log(sink) => sink.write(report).await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            AnyRecordSink::File(sink) => sink.close().await,
            AnyRecordSink::Log(sink) => sink.close().await,
        }
    }
}

pub struct Recorder {
    output_dir: PathBuf,
    sinks: Vec<AnyRecordSink>,
    rounds_written: u32,
}

impl Recorder {
    /// Build from configuration. Without any configured sink, records go to files.
    pub fn new(output_dir: impl Into<PathBuf>, configs: &[RecordSinkConfig]) -> Result<Self, RecordError> {
        let sinks = if configs.is_empty() {
            vec![AnyRecordSink::File(
                FileRecordSink::new("systime", Default::default())
                    .map_err(|e| RecordError::sink_creation("systime", e.to_string()))?,
            )]
        } else {
            configs
                .iter()
                .map(AnyRecordSink::from_config)
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(Self {
            output_dir: output_dir.into(),
            sinks,
            rounds_written: 0,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn rounds_written(&self) -> u32 {
        self.rounds_written
    }

    /// Create the timestamped directory for a new round.
    pub fn begin_round(&self) -> Result<RoundLayout, RecordError> {
        RoundLayout::create(&self.output_dir, Local::now())
    }

    /// Write the records of a completed round to every sink.
    #[instrument(name = "recorder_persist", skip(self, layout, records), fields(round, records = records.len()))]
    pub async fn persist(
        &mut self,
        round: u32,
        layout: &RoundLayout,
        records: Vec<TelemetryRecord>,
    ) -> Result<RoundReport, RecordError> {
        let report = RoundReport {
            round,
            dir: layout.dir().to_path_buf(),
            records,
        };
        for sink in &mut self.sinks {
            sink.write(&report).await?;
        }
        self.rounds_written += 1;
        info!(round, dir = %report.dir.display(), "round persisted");
        Ok(report)
    }

    /// Close every sink; failures are logged and the first one is returned.
    pub async fn close(&mut self) -> Result<(), RecordError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.close().await {
                warn!(sink = %sink.name(), error = %e, "record sink close failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TimeSample;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_default_sink_writes_records() {
        let base = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(base.path(), &[]).unwrap();
        assert_eq!(recorder.sink_names(), vec!["systime"]);

        let layout = recorder.begin_round().unwrap();
        let records = vec![
            TelemetryRecord::active("a".into(), TimeSample::new(1, 0, 5000, 0)),
            TelemetryRecord::passive("p".into(), TimeSample::default()),
        ];
        let report = recorder.persist(1, &layout, records).await.unwrap();

        assert_eq!(report.records.len(), 2);
        assert!(layout.record_path("a").exists());
        assert!(layout.record_path("p").exists());
        assert_eq!(recorder.rounds_written(), 1);
        recorder.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_configured_sinks() {
        let base = tempfile::tempdir().unwrap();
        let configs = vec![
            RecordSinkConfig {
                name: "log".into(),
                sink_type: RecordSinkType::Log,
                params: HashMap::new(),
            },
            RecordSinkConfig {
                name: "files".into(),
                sink_type: RecordSinkType::File,
                params: HashMap::new(),
            },
        ];
        let recorder = Recorder::new(base.path(), &configs).unwrap();
        assert_eq!(recorder.sink_names(), vec!["log", "files"]);
    }
}
