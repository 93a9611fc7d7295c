//! Serialized access to the scheduler state.
//!
//! Caller operations lock the state, mutate it and return; they never wait on
//! the network. Transfer completions arrive on arbitrary threads: they are
//! pushed to an inbox and applied by whichever thread holds, or can take, the
//! state lock. A transfer that completes inside `start()` (while the lock is
//! held by the same thread) is therefore applied right after the operation
//! that started it, never re-entrantly.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};

use crate::config::DlqConfig;
use crate::fanout::{subscribe, DownloadTicket};
use crate::locator::Locator;
use crate::pressure::{MemoryPressureSource, PressureRegistration};
use crate::transfer::{CompletionSink, TransferProvider};

use super::snapshot::SchedulerSnapshot;
use super::state::{Completion, SchedulerState};
use super::{CancelOutcome, ItemState, Priority};

/// Concurrency limit used when none is configured.
pub const DEFAULT_CONCURRENCY_LIMIT: NonZeroUsize = match NonZeroUsize::new(4) {
    Some(limit) => limit,
    None => panic!("default concurrency limit must be non-zero"),
};

/// Construction parameters for a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Maximum number of transfers running at once.
    pub concurrency_limit: NonZeroUsize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }
}

impl SchedulerOptions {
    pub fn with_limit(concurrency_limit: NonZeroUsize) -> Self {
        Self { concurrency_limit }
    }
}

impl From<&DlqConfig> for SchedulerOptions {
    fn from(cfg: &DlqConfig) -> Self {
        Self::with_limit(cfg.max_concurrent_downloads)
    }
}

struct Shared {
    state: Mutex<SchedulerState>,
    inbox: Mutex<VecDeque<Completion>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inbox(&self) -> MutexGuard<'_, VecDeque<Completion>> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the state lock, then apply completions that arrived meanwhile.
    /// Every lock taken outside `pump` goes through here; a completion pushed
    /// while the lock was held would otherwise sit in the inbox.
    fn with_state<R>(&self, f: impl FnOnce(&mut SchedulerState) -> R) -> R {
        let result = f(&mut self.state());
        self.pump();
        result
    }

    fn deliver(&self, completion: Completion) {
        self.inbox().push_back(completion);
        self.pump();
    }

    /// Drain the inbox if the state lock is free. If another thread holds it,
    /// that thread drains the inbox after releasing.
    fn pump(&self) {
        loop {
            let mut state = match self.state.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            loop {
                let next = self.inbox().pop_front();
                let Some(completion) = next else {
                    break;
                };
                state.complete(completion);
            }
            drop(state);
            if self.inbox().is_empty() {
                return;
            }
        }
    }
}

/// Builds completion sinks that feed back into one scheduler. Holds a weak
/// reference so in-flight transfers do not keep a dropped scheduler alive.
#[derive(Clone)]
pub(super) struct CompletionRoute(Weak<Shared>);

impl CompletionRoute {
    pub(super) fn sink(&self, locator: Locator, activation: u64) -> CompletionSink {
        let shared = self.0.clone();
        CompletionSink::new(move |outcome| {
            if let Some(shared) = shared.upgrade() {
                shared.deliver(Completion {
                    locator,
                    activation,
                    outcome,
                });
            }
        })
    }
}

/// Handle to a download scheduler. Cheap to clone; all clones share one state.
///
/// When the last handle is dropped every remaining item is destroyed, pending
/// tickets resolve to [`crate::DownloadError::Discarded`] and the
/// memory-pressure registration (if any) is removed.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
    pressure: Option<Arc<PressureRegistration>>,
}

impl Scheduler {
    pub fn new(provider: Arc<dyn TransferProvider>, options: SchedulerOptions) -> Self {
        let shared = Arc::new_cyclic(|weak| Shared {
            state: Mutex::new(SchedulerState::new(
                provider,
                options.concurrency_limit,
                CompletionRoute(weak.clone()),
            )),
            inbox: Mutex::new(VecDeque::new()),
        });
        Self {
            shared,
            pressure: None,
        }
    }

    /// Like [`Scheduler::new`], and registers with `source` so that each
    /// memory-pressure signal destroys all suspended items.
    pub fn with_memory_pressure(
        provider: Arc<dyn TransferProvider>,
        options: SchedulerOptions,
        source: &dyn MemoryPressureSource,
    ) -> Self {
        let scheduler = Self::new(provider, options);
        let weak = Arc::downgrade(&scheduler.shared);
        let registration = source.register(Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                let released = shared.with_state(|state| state.release_suspended());
                tracing::debug!(released, "memory pressure handled");
            }
        }));
        Self {
            pressure: Some(Arc::new(registration)),
            ..scheduler
        }
    }

    /// Request `locator`. Returns at once; the ticket resolves when the
    /// (possibly shared) transfer terminates.
    pub fn schedule(&self, locator: Locator, priority: Priority) -> DownloadTicket {
        let (subscriber, mut ticket) = subscribe(&locator, ItemState::Queued);
        let admitted = self
            .shared
            .with_state(|state| state.schedule(locator, priority, subscriber));
        ticket.set_admitted(admitted);
        ticket
    }

    /// Soft-cancel `locator`. Its subscribers are not notified.
    pub fn cancel(&self, locator: &Locator) -> CancelOutcome {
        self.shared.with_state(|state| state.cancel(locator))
    }

    /// Destroy every suspended item (the memory-pressure reaction). Returns how many.
    pub fn release_suspended(&self) -> usize {
        self.shared.with_state(|state| state.release_suspended())
    }

    /// Change the concurrency limit. Lowering it never stops running
    /// transfers; raising it starts waiting items in the new slots at once.
    pub fn set_concurrency_limit(&self, limit: NonZeroUsize) {
        self.shared.with_state(|state| state.set_limit(limit));
    }

    pub fn concurrency_limit(&self) -> NonZeroUsize {
        self.shared.with_state(|state| state.limit())
    }

    pub fn state_of(&self, locator: &Locator) -> Option<ItemState> {
        self.shared.with_state(|state| state.state_of(locator))
    }

    /// Current priority of a tracked locator.
    pub fn priority_of(&self, locator: &Locator) -> Option<Priority> {
        self.shared.with_state(|state| state.priority_of(locator))
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.shared.with_state(|state| state.snapshot())
    }

    /// True if this handle was built with a memory-pressure source.
    pub fn watches_memory_pressure(&self) -> bool {
        self.pressure.is_some()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Scheduler")
            .field("active", &snapshot.active.len())
            .field("waiting", &snapshot.waiting.len())
            .field("suspended", &snapshot.suspended.len())
            .field("concurrency_limit", &snapshot.concurrency_limit)
            .finish()
    }
}
