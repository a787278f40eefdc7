//! # Orchestrator
//!
//! 多会话同步编排模块。
//!
//! 负责：
//! - 一个 active + N 个 passive 会话的同步轮次 (parallel / lockstep)
//! - 首轮之前的接收机预热 (`prime_receivers`)
//! - 双向测距场景 (`measure_distance`)
//! - 运行统计 (`RunStats`)

pub mod distance;
pub mod error;
pub mod phase;
pub mod priming;
mod round;
pub mod stats;
pub mod synchronizer;

pub use distance::{
    measure_distance, prepare_ranging_session, Capture, DistanceReport, RangingScenario,
    RANGING_RECEIVE_SAMPLES,
};
pub use error::{OrchestratorError, Result, SessionFailure};
pub use phase::RoundPhase;
pub use priming::prime_receivers;
pub use stats::RunStats;
pub use synchronizer::Synchronizer;
