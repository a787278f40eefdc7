//! FileRecordSink - one `systime-<name>.txt` per session in the round directory

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use contracts::{ContractError, RecordSink, RoundReport};
use tracing::{debug, error, instrument};

use crate::layout::RoundLayout;

/// Configuration for FileRecordSink
#[derive(Debug, Clone, Default)]
pub struct FileRecordSinkConfig {
    /// Optional journal collecting every record of the run, prefixed with the round number
    pub journal: Option<PathBuf>,
}

impl FileRecordSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self {
            journal: params.get("journal").map(PathBuf::from),
        }
    }
}

pub struct FileRecordSink {
    name: String,
    config: FileRecordSinkConfig,
    journal: Option<File>,
}

impl FileRecordSink {
    pub fn new(name: impl Into<String>, config: FileRecordSinkConfig) -> std::io::Result<Self> {
        let journal = match &config.journal {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Some(OpenOptions::new().create(true).append(true).open(path)?)
            }
            None => None,
        };
        Ok(Self {
            name: name.into(),
            config,
            journal,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileRecordSinkConfig::from_params(params))
    }

    fn write_to_disk(&mut self, report: &RoundReport) -> std::io::Result<()> {
        let layout = RoundLayout::at(&report.dir);
        for record in &report.records {
            let path = layout.record_path(&record.session);
            let mut file = File::create(&path)?;
            writeln!(file, "{}", record.to_line())?;
            debug!(sink = %self.name, path = %path.display(), "record written");
        }
        if let Some(journal) = self.journal.as_mut() {
            for record in &report.records {
                writeln!(journal, "{};{}", report.round, record.to_line())?;
            }
            journal.flush()?;
        }
        Ok(())
    }
}

impl RecordSink for FileRecordSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_record_sink_write",
        skip(self, report),
        fields(sink = %self.name, round = report.round, records = report.records.len())
    )]
    async fn write(&mut self, report: &RoundReport) -> Result<(), ContractError> {
        self.write_to_disk(report).map_err(|e| {
            error!(sink = %self.name, round = report.round, error = %e, "Write failed");
            ContractError::stream(report.dir.display().to_string(), e.to_string())
        })
    }

    #[instrument(name = "file_record_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        if let Some(mut journal) = self.journal.take() {
            journal.flush()?;
            debug!(sink = %self.name, journal = ?self.config.journal, "journal closed");
        }
        Ok(())
    }
}
