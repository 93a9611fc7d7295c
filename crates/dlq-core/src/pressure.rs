//! Memory-pressure signal delivery.
//!
//! A [`MemoryPressureSource`] calls each registered handler when the process
//! is asked to give memory back. Registrations are RAII: dropping the
//! [`PressureRegistration`] removes the handler, so a scheduler registers once
//! at construction and unregisters when it goes away.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Callback invoked on every memory-pressure signal.
pub type PressureHandler = Arc<dyn Fn() + Send + Sync>;

/// Something that can deliver memory-pressure signals.
pub trait MemoryPressureSource {
    fn register(&self, handler: PressureHandler) -> PressureRegistration;
}

type Unregister = Box<dyn FnOnce() + Send + Sync>;

/// Removes its handler from the source when dropped.
pub struct PressureRegistration {
    unregister: Option<Unregister>,
}

impl PressureRegistration {
    pub fn new(unregister: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unregister: Some(Box::new(unregister)),
        }
    }

    /// Registration with nothing to undo (for sources that never fire).
    pub fn detached() -> Self {
        Self { unregister: None }
    }
}

impl Drop for PressureRegistration {
    fn drop(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl std::fmt::Debug for PressureRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PressureRegistration")
            .field("attached", &self.unregister.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Handlers {
    next_id: u64,
    by_id: BTreeMap<u64, PressureHandler>,
}

/// In-process memory-pressure broadcaster.
///
/// Call [`PressureSignal::notify`] from whatever observes the condition (the
/// CLI wires `SIGUSR1` to it). Handlers run on the notifying thread, outside
/// the signal's own lock, in registration order.
#[derive(Clone, Default)]
pub struct PressureSignal {
    handlers: Arc<Mutex<Handlers>>,
}

fn lock(handlers: &Mutex<Handlers>) -> MutexGuard<'_, Handlers> {
    handlers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PressureSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one signal. Returns how many handlers ran.
    pub fn notify(&self) -> usize {
        let handlers: Vec<PressureHandler> = lock(&self.handlers).by_id.values().cloned().collect();
        tracing::debug!(handlers = handlers.len(), "memory pressure signalled");
        for handler in &handlers {
            handler();
        }
        handlers.len()
    }

    pub fn handler_count(&self) -> usize {
        lock(&self.handlers).by_id.len()
    }
}

impl MemoryPressureSource for PressureSignal {
    fn register(&self, handler: PressureHandler) -> PressureRegistration {
        let id = {
            let mut handlers = lock(&self.handlers);
            let id = handlers.next_id;
            handlers.next_id += 1;
            handlers.by_id.insert(id, handler);
            id
        };
        let weak: Weak<Mutex<Handlers>> = Arc::downgrade(&self.handlers);
        PressureRegistration::new(move || {
            if let Some(handlers) = weak.upgrade() {
                lock(&handlers).by_id.remove(&id);
            }
        })
    }
}
