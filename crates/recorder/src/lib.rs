//! # Recorder
//!
//! 轮次输出模块。
//!
//! 负责：
//! - 为每轮创建时间戳目录 (`%Y%m%d-%H%M%S`，冲突时追加 `-N`)
//! - 约定样本文件命名 (`rcv-<name>.raw`, `u<ch>-<name>.raw`)
//! - 将遥测记录 fan-out 到 record sinks (`systime-<name>.txt`、日志)

pub mod error;
pub mod layout;
pub mod recorder;
pub mod sinks;

pub use contracts::{RecordSink, RoundReport, TelemetryRecord};
pub use error::RecordError;
pub use layout::{RoundLayout, ROUND_DIR_FORMAT};
pub use recorder::{AnyRecordSink, Recorder};
pub use sinks::{FileRecordSink, FileRecordSinkConfig, LogRecordSink};
