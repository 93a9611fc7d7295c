//! Transfer capability: the scheduler's only view of the transport.
//!
//! A [`TransferProvider`] creates one [`Transfer`] per download item. The
//! scheduler starts it, may suspend it (soft cancel, resumable) and start it
//! again later, or destroy it (hard cancel). Each `start` hands the transfer a
//! fresh [`CompletionSink`]; the transfer reports exactly one terminal outcome
//! through it, from any thread.
//!
//! Implementations must not call back into the scheduler from `start`,
//! `suspend` or `destroy`; those run while the scheduler state is locked.
//! Completing the sink from inside `start` is allowed.

mod http;
pub mod scripted;

use bytes::Bytes;

use crate::error::TransferError;
use crate::locator::Locator;

pub use self::http::CurlProvider;

/// Terminal result of one transfer.
pub type TransferOutcome = Result<Bytes, TransferError>;

/// Handle to one resource transfer, exclusively owned by its download item.
pub trait Transfer: Send {
    /// Begin (or resume after `suspend`) the transfer. The outcome goes to `sink`.
    fn start(&mut self, sink: CompletionSink);

    /// Stop the transfer but keep whatever is needed to resume it. The sink
    /// from the last `start` must not deliver a result after this returns.
    fn suspend(&mut self);

    /// Release the transfer irreversibly.
    fn destroy(self: Box<Self>);
}

/// Creates transfers for locators.
pub trait TransferProvider: Send + Sync {
    fn create(&self, locator: &Locator) -> Box<dyn Transfer>;
}

type Deliver = Box<dyn FnOnce(TransferOutcome) + Send>;

/// One-shot completion channel from a transfer back to the scheduler.
///
/// Consumed by [`CompletionSink::complete`]. A sink dropped without completing
/// reports [`TransferError::Abandoned`], so a transport that dies silently
/// still frees its concurrency slot.
pub struct CompletionSink {
    deliver: Option<Deliver>,
}

impl CompletionSink {
    pub fn new(deliver: impl FnOnce(TransferOutcome) + Send + 'static) -> Self {
        Self {
            deliver: Some(Box::new(deliver)),
        }
    }

    /// Sink that discards its outcome.
    pub fn detached() -> Self {
        Self { deliver: None }
    }

    pub fn complete(mut self, outcome: TransferOutcome) {
        if let Some(deliver) = self.deliver.take() {
            deliver(outcome);
        }
    }

    /// Drop the sink without reporting anything. Only for transfers that were
    /// suspended or destroyed, whose result the scheduler no longer wants.
    pub fn dismiss(mut self) {
        self.deliver = None;
    }
}

impl Drop for CompletionSink {
    fn drop(&mut self) {
        if let Some(deliver) = self.deliver.take() {
            deliver(Err(TransferError::Abandoned));
        }
    }
}

impl std::fmt::Debug for CompletionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSink")
            .field("pending", &self.deliver.is_some())
            .finish()
    }
}
