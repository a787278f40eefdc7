//! # Session
//!
//! Protocol engine for one acoustic modem.
//!
//! Responsibilities:
//! - Correlate commands with replies under a timeout (`expect`)
//! - Route streamed samples to memory or files (`SinkManager`)
//! - Cycle USBL channels and fetch device time
//! - Load and store sample streams (`raw:` / `ascii:`)
//! - Provide scripted and simulated transports for tests and demos

pub mod error;
pub mod expect;
pub mod mock_transport;
pub mod session;
pub mod simulator;
pub mod sink;
pub mod stream;
pub mod systime;
pub mod usbl;

pub use error::{Result, SessionError};
pub use expect::ReplyExpectation;
pub use mock_transport::{ScriptHandle, ScriptedTransport};
pub use session::{Session, DEFAULT_USBL_HEADS};
pub use simulator::{SimulatedLink, SimulatedMedium};
pub use sink::SinkManager;
pub use stream::{load_concatenated, load_samples, SampleWriter, StreamFormat, StreamPath};
