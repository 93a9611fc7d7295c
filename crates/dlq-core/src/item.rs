//! One tracked download: identity, priority, subscribers and its transfer.

use crate::fanout::{fan_out, Subscriber};
use crate::locator::Locator;
use crate::scheduler::Priority;
use crate::transfer::{CompletionSink, Transfer, TransferOutcome};

/// A download item is owned by exactly one scheduler collection at a time.
/// Its transfer is created with the item and lives until the item is
/// finished or destroyed.
pub(crate) struct DownloadItem {
    locator: Locator,
    priority: Priority,
    subscribers: Vec<Subscriber>,
    transfer: Box<dyn Transfer>,
    /// Id of the most recent `start`; 0 before the first one.
    activation: u64,
}

impl DownloadItem {
    pub(crate) fn new(locator: Locator, priority: Priority, transfer: Box<dyn Transfer>) -> Self {
        Self {
            locator,
            priority,
            subscribers: Vec::new(),
            transfer,
            activation: 0,
        }
    }

    pub(crate) fn locator(&self) -> &Locator {
        &self.locator
    }

    pub(crate) fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn activation(&self) -> u64 {
        self.activation
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn add_subscriber(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    pub(crate) fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    /// OR the request's priority into the item's.
    pub(crate) fn upgrade_priority(&mut self, priority: Priority) {
        self.priority = self.priority.upgrade(priority);
    }

    pub(crate) fn start(&mut self, activation: u64, sink: CompletionSink) {
        self.activation = activation;
        self.transfer.start(sink);
    }

    pub(crate) fn suspend(&mut self) {
        self.transfer.suspend();
    }

    /// Release the transfer irreversibly. Pending tickets resolve as discarded.
    /// Returns how many subscribers were dropped.
    pub(crate) fn destroy(self) -> usize {
        let dropped = self.subscribers.len();
        self.transfer.destroy();
        dropped
    }

    /// Deliver the terminal outcome to every subscriber. Returns how many received it.
    pub(crate) fn finish(self, outcome: &TransferOutcome) -> usize {
        fan_out(self.subscribers, outcome)
    }
}

impl std::fmt::Debug for DownloadItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadItem")
            .field("locator", &self.locator)
            .field("priority", &self.priority)
            .field("subscribers", &self.subscribers.len())
            .field("activation", &self.activation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DownloadError, TransferError};
    use crate::fanout::subscribe;
    use crate::scheduler::ItemState;
    use crate::transfer::scripted::{ScriptedProvider, TransferEvent};
    use crate::transfer::TransferProvider;

    fn item(provider: &ScriptedProvider, url: &str) -> DownloadItem {
        let locator = Locator::parse(url).unwrap();
        let transfer = provider.create(&locator);
        DownloadItem::new(locator, Priority::Normal, transfer)
    }

    #[tokio::test]
    async fn finish_notifies_subscribers_in_order_with_same_result() {
        let provider = ScriptedProvider::new();
        let mut it = item(&provider, "http://testA.com/x");
        let (s1, t1) = subscribe(it.locator(), ItemState::Active);
        let (s2, t2) = subscribe(it.locator(), ItemState::Active);
        it.add_subscriber(s1);
        it.add_subscriber(s2);
        assert_eq!(it.subscriber_count(), 2);
        assert_eq!(it.finish(&Err(TransferError::Http(410))), 2);
        assert_eq!(t1.await.unwrap_err(), DownloadError::Transfer(TransferError::Http(410)));
        assert_eq!(t2.await.unwrap_err(), DownloadError::Transfer(TransferError::Http(410)));
    }

    #[tokio::test]
    async fn destroy_releases_transfer_and_discards_tickets() {
        let provider = ScriptedProvider::new();
        let mut it = item(&provider, "http://testA.com/x");
        let locator = it.locator().clone();
        let (s, t) = subscribe(&locator, ItemState::Suspended);
        it.add_subscriber(s);
        assert_eq!(it.destroy(), 1);
        assert_eq!(provider.count(&locator, TransferEvent::Destroyed), 1);
        assert!(matches!(t.await, Err(DownloadError::Discarded { .. })));
    }

    #[test]
    fn priority_upgrade_and_reset() {
        let provider = ScriptedProvider::new();
        let mut it = item(&provider, "http://testA.com/x");
        it.upgrade_priority(Priority::Forced);
        it.upgrade_priority(Priority::Normal);
        assert_eq!(it.priority(), Priority::Forced);
        it.set_priority(Priority::Normal);
        assert_eq!(it.priority(), Priority::Normal);
    }

    #[test]
    fn start_records_activation_and_suspend_keeps_transfer() {
        let provider = ScriptedProvider::new();
        let mut it = item(&provider, "http://testA.com/x");
        it.start(7, CompletionSink::detached());
        assert_eq!(it.activation(), 7);
        it.suspend();
        it.start(8, CompletionSink::detached());
        assert_eq!(it.activation(), 8);
        assert_eq!(
            provider.events(it.locator()),
            vec![
                TransferEvent::Created,
                TransferEvent::Started,
                TransferEvent::Suspended,
                TransferEvent::Started
            ]
        );
    }
}
