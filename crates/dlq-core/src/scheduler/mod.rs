//! Bounded-concurrency download scheduler.
//!
//! Tracks each locator in exactly one of three collections (active, waiting,
//! suspended), coalesces duplicate requests, promotes forced requests ahead of
//! normal ones, and reclaims suspended transfers on memory pressure.

mod engine;
mod queue;
mod snapshot;
mod state;
mod types;

pub use engine::{Scheduler, SchedulerOptions, DEFAULT_CONCURRENCY_LIMIT};
pub use snapshot::SchedulerSnapshot;
pub use types::{CancelOutcome, ItemState, Priority};
