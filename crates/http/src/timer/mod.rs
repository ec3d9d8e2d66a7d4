//! Idle connection timers.
//!
//! - [`DeadlineIndex`]: `(expires, id)` ordered entries with one callback per id
//! - [`SharedDeadlineIndex`]: the index behind a single mutex, shared by the
//!   accept loop, the connection tasks and the reaper
//!
//! The reaper feeds [`DeadlineIndex::next_deadline`] into its sleep, so expired
//! connections are closed without a periodic tick.

mod deadline_index;
mod error;

pub use deadline_index::{DeadlineIndex, SharedDeadlineIndex, TimerCallback};
pub use error::TimerError;
