//! Record sink implementations
//!
//! Contains FileRecordSink and LogRecordSink.

mod file;
mod log;

pub use self::file::{FileRecordSink, FileRecordSinkConfig};
pub use self::log::LogRecordSink;
