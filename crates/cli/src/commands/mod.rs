//! Command implementations.

mod distance;
mod info;
mod run;
mod validate;

pub use distance::run_distance;
pub use info::run_info;
pub use run::run_sync;
pub use validate::run_validate;
