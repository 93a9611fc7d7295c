//! Request priority, item states and cancel outcomes.

/// Priority of a download request.
///
/// `Forced` items are promoted from the waiting queue before any `Normal`
/// item, regardless of arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    #[default]
    Normal,
    Forced,
}

impl Priority {
    /// Combine two requests for the same item: forced wins, never downgraded.
    pub fn upgrade(self, other: Priority) -> Priority {
        self.max(other)
    }

    pub fn is_forced(self) -> bool {
        self == Priority::Forced
    }
}

impl From<bool> for Priority {
    fn from(force: bool) -> Self {
        if force {
            Priority::Forced
        } else {
            Priority::Normal
        }
    }
}

/// Which collection currently holds a tracked item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    Queued,
    Active,
    Suspended,
}

impl ItemState {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemState::Queued => "queued",
            ItemState::Active => "active",
            ItemState::Suspended => "suspended",
        }
    }
}

/// What `cancel` did. Cancelling is never an error; the last two variants
/// report requests that had nothing to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Transfer was running; it is suspended and its slot handed on.
    SuspendedActive,
    /// Item was waiting; it is suspended without ever starting.
    SuspendedQueued,
    AlreadySuspended,
    NotTracked,
}

impl CancelOutcome {
    /// True if this call moved an item into the suspended set.
    pub fn suspended(self) -> bool {
        matches!(
            self,
            CancelOutcome::SuspendedActive | CancelOutcome::SuspendedQueued
        )
    }
}
