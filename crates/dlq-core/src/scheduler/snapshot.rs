//! Point-in-time view of the scheduler's collections.

use crate::locator::Locator;

/// Membership of the three collections when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    /// Running items in the order they were started.
    pub active: Vec<Locator>,
    /// Queued items in promotion order: the next item to start comes first.
    pub waiting: Vec<Locator>,
    /// Soft-cancelled items in the order they were suspended.
    pub suspended: Vec<Locator>,
    pub concurrency_limit: usize,
}

impl SchedulerSnapshot {
    pub fn is_idle(&self) -> bool {
        self.active.is_empty() && self.waiting.is_empty()
    }

    /// Number of locators tracked across all three collections.
    pub fn tracked(&self) -> usize {
        self.active.len() + self.waiting.len() + self.suspended.len()
    }
}
