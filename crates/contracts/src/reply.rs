//! Decoded modem replies

use std::fmt;

use crate::TimeSample;

/// Top-level reply type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    Stop,
    /// Receive stream started
    Rx,
    /// USBL stream started
    UsblRx,
    Systime,
    /// Asynchronous external sync pulse
    SyncIn,
    /// Asynchronous JANUS frame detection
    JanusDetected,
    Busy,
    Report,
}

impl ReplyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyKind::Stop => "STOP",
            ReplyKind::Rx => "RX",
            ReplyKind::UsblRx => "USBL_RX",
            ReplyKind::Systime => "SYSTIME",
            ReplyKind::SyncIn => "SYNCIN",
            ReplyKind::JanusDetected => "JANUS_DETECTED",
            ReplyKind::Busy => "BUSY",
            ReplyKind::Report => "REPORT",
        }
    }

    /// Replies the device emits on its own, outside any command cycle.
    pub fn is_async(&self) -> bool {
        matches!(self, ReplyKind::SyncIn | ReplyKind::JanusDetected)
    }
}

impl fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-kind carried by a REPORT reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    NoSdmMode,
    TxStop,
    RxStop,
    Ref,
    Config,
    UsblConfig,
    UsblRxStop,
    /// SYSTIME request failed
    Systime,
    /// Device dropped samples
    Drop,
    Unknown,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::NoSdmMode => "NO_SDM_MODE",
            ReportKind::TxStop => "TX_STOP",
            ReportKind::RxStop => "RX_STOP",
            ReportKind::Ref => "REF",
            ReportKind::Config => "CONFIG",
            ReportKind::UsblConfig => "USBL_CONFIG",
            ReportKind::UsblRxStop => "USBL_RX_STOP",
            ReportKind::Systime => "SYSTIME",
            ReportKind::Drop => "DROP",
            ReportKind::Unknown => "UNKNOWN",
        }
    }

    /// Reports whose value is a success flag (0 = rejected).
    pub fn is_acknowledgement(&self) -> bool {
        matches!(self, ReportKind::Ref | ReportKind::Config | ReportKind::UsblConfig)
    }

    /// Reports that close a receive stream.
    pub fn ends_stream(&self) -> bool {
        matches!(self, ReportKind::RxStop | ReportKind::UsblRxStop)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Stop,
    Rx,
    UsblRx,
    Systime(TimeSample),
    SyncIn,
    JanusDetected,
    /// Device is still executing a previous command
    Busy { param: u16 },
    Report { kind: ReportKind, value: u32 },
}

impl Reply {
    pub fn kind(&self) -> ReplyKind {
        match self {
            Reply::Stop => ReplyKind::Stop,
            Reply::Rx => ReplyKind::Rx,
            Reply::UsblRx => ReplyKind::UsblRx,
            Reply::Systime(_) => ReplyKind::Systime,
            Reply::SyncIn => ReplyKind::SyncIn,
            Reply::JanusDetected => ReplyKind::JanusDetected,
            Reply::Busy { .. } => ReplyKind::Busy,
            Reply::Report { .. } => ReplyKind::Report,
        }
    }

    pub fn report_kind(&self) -> Option<ReportKind> {
        match self {
            Reply::Report { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Shorthand for a successful acknowledgement report.
    pub fn ack(kind: ReportKind) -> Self {
        Reply::Report { kind, value: 1 }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Systime(t) => write!(f, "SYSTIME {}", t),
            Reply::Busy { param } => write!(f, "BUSY param={}", param),
            Reply::Report { kind, value } => write!(f, "REPORT {} value={}", kind, value),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_classification() {
        assert!(ReportKind::Config.is_acknowledgement());
        assert!(!ReportKind::TxStop.is_acknowledgement());
        assert!(ReportKind::UsblRxStop.ends_stream());
        assert!(ReplyKind::SyncIn.is_async());
        assert!(!ReplyKind::Stop.is_async());
    }

    #[test]
    fn test_display() {
        let reply = Reply::Report {
            kind: ReportKind::TxStop,
            value: 0,
        };
        assert_eq!(reply.to_string(), "REPORT TX_STOP value=0");
        assert_eq!(Reply::Stop.to_string(), "STOP");
        assert_eq!(reply.report_kind(), Some(ReportKind::TxStop));
    }
}
