//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace:
//! modem commands, decoded replies, timestamps, sink descriptors, telemetry
//! records, the transport traits and the run configuration blueprint.
//! Business crates depend on this crate, never the other way round.
//!
//! ## Time Model
//! - Device timestamps are free-running 32-bit counters in sample-clock ticks
//! - Counters wrap; never compare them without `ranging::calc_delta`

mod blueprint;
mod command;
mod error;
mod record;
mod reply;
mod session_id;
mod sink;
mod time;
mod transport;

pub use blueprint::*;
pub use command::*;
pub use error::*;
pub use record::{LocalRecordSink, RecordSink, RoundReport, TelemetryRecord};
pub use reply::*;
pub use session_id::SessionId;
pub use sink::*;
pub use time::TimeSample;
pub use transport::{Connector, Inbound, LocalTransport, Transport};
