//! Modem command set
//!
//! Commands are sent through a [`Transport`](crate::Transport); the byte
//! encoding belongs to the transport, not to this crate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ContractError, ReplyKind, ReportKind};

/// Largest sample count a single TX/REF/RX command may carry (24-bit field, 1024-aligned).
pub const MAX_STREAM_SAMPLES: u32 = 16_776_192;

/// Largest sample count for one USBL channel capture.
pub const MAX_USBL_SAMPLES: u32 = 51_200;

/// Number of USBL receive heads the device exposes.
pub const MAX_USBL_HEADS: u8 = 5;

/// Modem transmit/receive configuration (CONFIG command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemConfig {
    /// Detection threshold, 0 disables detection and starts receiving at once
    #[serde(default = "default_threshold")]
    pub threshold: u16,

    /// Receive gain, 0 or 1
    #[serde(default)]
    pub gain: u8,

    /// Transmit source level, 0 (loudest) to 3
    #[serde(default = "default_source_level")]
    pub source_level: u8,

    /// Preamplifier gain, 0 to 13
    #[serde(default)]
    pub preamp_gain: u8,
}

fn default_threshold() -> u16 {
    350
}

fn default_source_level() -> u8 {
    3
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            gain: 0,
            source_level: default_source_level(),
            preamp_gain: 0,
        }
    }
}

impl ModemConfig {
    /// Same configuration with detection disabled.
    pub fn with_threshold(self, threshold: u16) -> Self {
        Self { threshold, ..self }
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        check_range("config.threshold", self.threshold as u32, 0, 4095)?;
        check_range("config.gain", self.gain as u32, 0, 1)?;
        check_range("config.source_level", self.source_level as u32, 0, 3)?;
        check_range("config.preamp_gain", self.preamp_gain as u32, 0, 13)
    }
}

/// USBL capture configuration (USBL_CONFIG command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsblConfig {
    /// Delay before capture starts, in samples
    #[serde(default)]
    pub delay: u32,

    /// Samples captured per channel, multiple of 1024
    #[serde(default = "default_usbl_samples")]
    pub samples: u32,

    /// Channel gain, 0 to 13
    #[serde(default = "default_usbl_gain")]
    pub gain: u8,

    /// Sample rate selector, 0 to 6
    #[serde(default = "default_usbl_rate")]
    pub sample_rate: u8,
}

fn default_usbl_samples() -> u32 {
    25_600
}

fn default_usbl_gain() -> u8 {
    13
}

fn default_usbl_rate() -> u8 {
    4
}

impl Default for UsblConfig {
    fn default() -> Self {
        Self {
            delay: 0,
            samples: default_usbl_samples(),
            gain: default_usbl_gain(),
            sample_rate: default_usbl_rate(),
        }
    }
}

impl UsblConfig {
    pub fn validate(&self) -> Result<(), ContractError> {
        check_range("usbl.delay", self.delay, 0, 65_535)?;
        check_range("usbl.samples", self.samples, 1024, MAX_USBL_SAMPLES)?;
        if self.samples % 1024 != 0 {
            return Err(ContractError::invalid_parameter(
                "usbl.samples",
                format!("{} is not a multiple of 1024", self.samples),
            ));
        }
        check_range("usbl.gain", self.gain as u32, 0, 13)?;
        check_range("usbl.sample_rate", self.sample_rate as u32, 0, 6)
    }
}

/// A single command addressed to one modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Abort whatever the device is doing
    Stop,
    /// Request the four device counters
    Systime,
    Config(ModemConfig),
    UsblConfig(UsblConfig),
    /// Upload the reference (preamble) waveform
    Ref(Vec<i16>),
    /// Transmit a waveform
    Tx(Vec<i16>),
    /// Receive `samples` samples, 0 means until STOP
    Rx { samples: u32 },
    /// Fetch a USBL capture from one channel
    UsblRx { channel: u8, samples: u32 },
}

/// Command discriminant, used for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Stop,
    Systime,
    Config,
    UsblConfig,
    Ref,
    Tx,
    Rx,
    UsblRx,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Stop => "stop",
            CommandKind::Systime => "systime",
            CommandKind::Config => "config",
            CommandKind::UsblConfig => "usbl_config",
            CommandKind::Ref => "ref",
            CommandKind::Tx => "tx",
            CommandKind::Rx => "rx",
            CommandKind::UsblRx => "usbl_rx",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reply a command is normally answered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedReply {
    pub primary: ReplyKind,
    pub secondary: Option<ReportKind>,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Stop => CommandKind::Stop,
            Command::Systime => CommandKind::Systime,
            Command::Config(_) => CommandKind::Config,
            Command::UsblConfig(_) => CommandKind::UsblConfig,
            Command::Ref(_) => CommandKind::Ref,
            Command::Tx(_) => CommandKind::Tx,
            Command::Rx { .. } => CommandKind::Rx,
            Command::UsblRx { .. } => CommandKind::UsblRx,
        }
    }

    /// Whether the command starts a sample stream towards the host.
    pub fn starts_stream(&self) -> bool {
        matches!(self, Command::Rx { .. } | Command::UsblRx { .. })
    }

    /// Check the parameters against what the device accepts.
    pub fn validate(&self) -> Result<(), ContractError> {
        match self {
            Command::Stop | Command::Systime => Ok(()),
            Command::Config(config) => config.validate(),
            Command::UsblConfig(config) => config.validate(),
            Command::Ref(samples) => check_payload("ref", samples),
            Command::Tx(samples) => check_payload("tx", samples),
            Command::Rx { samples } => check_range("rx.samples", *samples, 0, MAX_STREAM_SAMPLES),
            Command::UsblRx { channel, samples } => {
                check_range("usbl_rx.channel", *channel as u32, 0, (MAX_USBL_HEADS - 1) as u32)?;
                check_range("usbl_rx.samples", *samples, 0, MAX_USBL_SAMPLES)
            }
        }
    }

    /// Reply that acknowledges this command.
    pub fn expected_reply(&self) -> ExpectedReply {
        let (primary, secondary) = match self {
            Command::Stop | Command::Rx { .. } | Command::UsblRx { .. } => (ReplyKind::Stop, None),
            Command::Systime => (ReplyKind::Systime, None),
            Command::Config(_) => (ReplyKind::Report, Some(ReportKind::Config)),
            Command::UsblConfig(_) => (ReplyKind::Report, Some(ReportKind::UsblConfig)),
            Command::Ref(_) => (ReplyKind::Report, Some(ReportKind::Ref)),
            Command::Tx(_) => (ReplyKind::Report, Some(ReportKind::TxStop)),
        };
        ExpectedReply { primary, secondary }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Stop | Command::Systime => write!(f, "{}", self.kind()),
            Command::Config(c) => write!(
                f,
                "config threshold={} gain={} srclvl={} preamp={}",
                c.threshold, c.gain, c.source_level, c.preamp_gain
            ),
            Command::UsblConfig(c) => write!(
                f,
                "usbl_config delay={} samples={} gain={} rate={}",
                c.delay, c.samples, c.gain, c.sample_rate
            ),
            Command::Ref(s) => write!(f, "ref samples={}", s.len()),
            Command::Tx(s) => write!(f, "tx samples={}", s.len()),
            Command::Rx { samples } => write!(f, "rx samples={}", samples),
            Command::UsblRx { channel, samples } => {
                write!(f, "usbl_rx channel={} samples={}", channel, samples)
            }
        }
    }
}

fn check_range(field: &str, value: u32, min: u32, max: u32) -> Result<(), ContractError> {
    if value < min || value > max {
        return Err(ContractError::invalid_parameter(
            field,
            format!("{} is outside {}..={}", value, min, max),
        ));
    }
    Ok(())
}

fn check_payload(field: &str, samples: &[i16]) -> Result<(), ContractError> {
    if samples.is_empty() {
        return Err(ContractError::invalid_parameter(field, "empty sample payload"));
    }
    if samples.len() > MAX_STREAM_SAMPLES as usize {
        return Err(ContractError::invalid_parameter(
            field,
            format!("{} samples exceeds {}", samples.len(), MAX_STREAM_SAMPLES),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ModemConfig::default().validate().is_ok());
        assert!(UsblConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_ranges() {
        let bad = ModemConfig {
            threshold: 4096,
            ..ModemConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(ContractError::InvalidParameter { ref field, .. }) if field == "config.threshold"
        ));

        let bad = ModemConfig {
            preamp_gain: 14,
            ..ModemConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_usbl_samples_alignment() {
        let bad = UsblConfig {
            samples: 2000,
            ..UsblConfig::default()
        };
        let err = bad.validate().unwrap_err();
        assert!(err.to_string().contains("multiple of 1024"));

        let ok = UsblConfig {
            samples: 51_200,
            ..UsblConfig::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_payload_limits() {
        assert!(Command::Tx(vec![]).validate().is_err());
        assert!(Command::Ref(vec![1, 2, 3]).validate().is_ok());
        assert!(Command::Rx { samples: MAX_STREAM_SAMPLES + 1 }.validate().is_err());
        assert!(Command::UsblRx { channel: 5, samples: 1024 }.validate().is_err());
        assert!(Command::UsblRx { channel: 4, samples: 1024 }.validate().is_ok());
    }

    #[test]
    fn test_expected_reply() {
        let tx = Command::Tx(vec![0; 4]).expected_reply();
        assert_eq!(tx.primary, ReplyKind::Report);
        assert_eq!(tx.secondary, Some(ReportKind::TxStop));
        assert_eq!(Command::Rx { samples: 10 }.expected_reply().primary, ReplyKind::Stop);
        assert_eq!(Command::Systime.expected_reply().primary, ReplyKind::Systime);
    }

    #[test]
    fn test_config_toml_defaults() {
        let config: ModemConfig = toml::from_str("threshold = 0").unwrap();
        assert_eq!(config.threshold, 0);
        assert_eq!(config.source_level, 3);
    }
}
