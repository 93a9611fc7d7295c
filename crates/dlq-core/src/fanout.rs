//! Delivery of one terminal result to every coalesced subscriber.
//!
//! Each `schedule` call gets its own one-shot channel. The sending half is
//! stored on the download item as a [`Subscriber`]; the receiving half is the
//! caller's [`DownloadTicket`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::DownloadError;
use crate::locator::Locator;
use crate::scheduler::ItemState;
use crate::transfer::TransferOutcome;

/// Sending half held by a download item.
#[derive(Debug)]
pub(crate) struct Subscriber(oneshot::Sender<TransferOutcome>);

/// Create a subscriber and the ticket that observes it.
pub(crate) fn subscribe(locator: &Locator, admitted: ItemState) -> (Subscriber, DownloadTicket) {
    let (tx, rx) = oneshot::channel();
    (
        Subscriber(tx),
        DownloadTicket {
            locator: locator.clone(),
            admitted,
            rx,
        },
    )
}

/// Send `outcome` to every subscriber in subscription order. Subscribers whose
/// ticket was dropped are skipped. Returns how many tickets received it.
pub(crate) fn fan_out(subscribers: Vec<Subscriber>, outcome: &TransferOutcome) -> usize {
    subscribers
        .into_iter()
        .filter(|Subscriber(tx)| !tx.is_closed())
        .filter_map(|Subscriber(tx)| tx.send(outcome.clone()).ok())
        .count()
}

/// Pending result of a scheduled download.
///
/// Resolves once the item's transfer terminates. If the item is destroyed
/// first (memory pressure while suspended, or the scheduler is dropped), it
/// resolves to [`DownloadError::Discarded`]. Cancelling does not resolve it.
#[derive(Debug)]
pub struct DownloadTicket {
    locator: Locator,
    admitted: ItemState,
    rx: oneshot::Receiver<TransferOutcome>,
}

impl DownloadTicket {
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Where the request landed when it was scheduled (after coalescing).
    pub fn admitted(&self) -> ItemState {
        self.admitted
    }

    pub(crate) fn set_admitted(&mut self, state: ItemState) {
        self.admitted = state;
    }
}

impl Future for DownloadTicket {
    type Output = Result<Bytes, DownloadError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(e)) => Err(DownloadError::Transfer(e)),
            Err(_) => Err(DownloadError::Discarded {
                locator: self.locator.to_string(),
            }),
        })
    }
}
