//! Deterministic in-memory transfers for tests and dry runs.
//!
//! Nothing moves until the test says so: `start` only records the call and
//! parks the sink; [`ScriptedProvider::complete`] delivers an outcome on the
//! calling thread, so every scheduler reaction has happened when it returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::error::TransferError;
use crate::locator::Locator;

use super::{CompletionSink, Transfer, TransferOutcome, TransferProvider};

/// Call recorded by a scripted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    Created,
    Started,
    Suspended,
    Destroyed,
}

#[derive(Default)]
struct Script {
    log: Vec<(Locator, TransferEvent)>,
    running: HashMap<Locator, CompletionSink>,
    on_start: HashMap<Locator, TransferOutcome>,
}

/// Provider whose transfers complete only when told to.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every recorded call, in order.
    pub fn log(&self) -> Vec<(Locator, TransferEvent)> {
        self.script().log.clone()
    }

    /// Calls recorded for one locator, in order.
    pub fn events(&self, locator: &Locator) -> Vec<TransferEvent> {
        self.script()
            .log
            .iter()
            .filter(|(l, _)| l == locator)
            .map(|(_, e)| *e)
            .collect()
    }

    pub fn count(&self, locator: &Locator, event: TransferEvent) -> usize {
        self.events(locator).iter().filter(|e| **e == event).count()
    }

    /// True while the locator's transfer is started and has not reported.
    pub fn is_running(&self, locator: &Locator) -> bool {
        self.script().running.contains_key(locator)
    }

    /// Deliver `outcome` for a running transfer. Returns false if it is not running.
    pub fn complete(&self, locator: &Locator, outcome: TransferOutcome) -> bool {
        let sink = self.script().running.remove(locator);
        match sink {
            Some(sink) => {
                sink.complete(outcome);
                true
            }
            None => false,
        }
    }

    pub fn succeed(&self, locator: &Locator, body: &'static [u8]) -> bool {
        self.complete(locator, Ok(Bytes::from_static(body)))
    }

    pub fn fail(&self, locator: &Locator, error: TransferError) -> bool {
        self.complete(locator, Err(error))
    }

    /// Drop a running transfer's sink without reporting (a transport that died).
    pub fn abandon(&self, locator: &Locator) -> bool {
        let sink = self.script().running.remove(locator);
        sink.is_some()
    }

    /// Make the next `start` for `locator` complete immediately with `outcome`.
    pub fn complete_on_start(&self, locator: &Locator, outcome: TransferOutcome) {
        self.script().on_start.insert(locator.clone(), outcome);
    }
}

impl TransferProvider for ScriptedProvider {
    fn create(&self, locator: &Locator) -> Box<dyn Transfer> {
        self.script()
            .log
            .push((locator.clone(), TransferEvent::Created));
        Box::new(ScriptedTransfer {
            locator: locator.clone(),
            script: Arc::clone(&self.script),
        })
    }
}

struct ScriptedTransfer {
    locator: Locator,
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransfer {
    fn record(&self, event: TransferEvent) -> MutexGuard<'_, Script> {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        script.log.push((self.locator.clone(), event));
        script
    }
}

impl Transfer for ScriptedTransfer {
    fn start(&mut self, sink: CompletionSink) {
        let mut script = self.record(TransferEvent::Started);
        match script.on_start.remove(&self.locator) {
            Some(outcome) => {
                drop(script);
                sink.complete(outcome);
            }
            None => {
                let previous = script.running.insert(self.locator.clone(), sink);
                drop(script);
                if let Some(previous) = previous {
                    previous.dismiss();
                }
            }
        }
    }

    fn suspend(&mut self) {
        let sink = self.record(TransferEvent::Suspended).running.remove(&self.locator);
        if let Some(sink) = sink {
            sink.dismiss();
        }
    }

    fn destroy(self: Box<Self>) {
        let sink = self.record(TransferEvent::Destroyed).running.remove(&self.locator);
        if let Some(sink) = sink {
            sink.dismiss();
        }
    }
}
