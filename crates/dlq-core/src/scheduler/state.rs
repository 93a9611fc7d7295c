//! The scheduler state machine: active, waiting and suspended items.
//!
//! Every method runs with the state lock held (see `engine`). Transfers are
//! started and suspended from here, but their completions come back through
//! the engine's inbox, never by re-entering these methods directly.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::fanout::Subscriber;
use crate::item::DownloadItem;
use crate::locator::Locator;
use crate::transfer::{TransferOutcome, TransferProvider};

use super::engine::CompletionRoute;
use super::queue::WaitingQueue;
use super::snapshot::SchedulerSnapshot;
use super::{CancelOutcome, ItemState, Priority};

/// Outcome reported by a transfer, tagged with the activation it belongs to.
#[derive(Debug)]
pub(super) struct Completion {
    pub(super) locator: Locator,
    pub(super) activation: u64,
    pub(super) outcome: TransferOutcome,
}

pub(super) struct SchedulerState {
    active: Vec<DownloadItem>,
    waiting: WaitingQueue,
    suspended: Vec<DownloadItem>,
    limit: NonZeroUsize,
    next_activation: u64,
    provider: Arc<dyn TransferProvider>,
    route: CompletionRoute,
}

impl SchedulerState {
    pub(super) fn new(
        provider: Arc<dyn TransferProvider>,
        limit: NonZeroUsize,
        route: CompletionRoute,
    ) -> Self {
        Self {
            active: Vec::new(),
            waiting: WaitingQueue::default(),
            suspended: Vec::new(),
            limit,
            next_activation: 1,
            provider,
            route,
        }
    }

    pub(super) fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    fn has_free_slot(&self) -> bool {
        self.active.len() < self.limit.get()
    }

    pub(super) fn state_of(&self, locator: &Locator) -> Option<ItemState> {
        if self.active.iter().any(|item| item.locator() == locator) {
            Some(ItemState::Active)
        } else if self.waiting.contains(locator) {
            Some(ItemState::Queued)
        } else if self.suspended.iter().any(|item| item.locator() == locator) {
            Some(ItemState::Suspended)
        } else {
            None
        }
    }

    pub(super) fn priority_of(&self, locator: &Locator) -> Option<Priority> {
        self.active
            .iter()
            .chain(self.suspended.iter())
            .find(|item| item.locator() == locator)
            .map(DownloadItem::priority)
            .or_else(|| self.waiting.priority_of(locator))
    }

    /// Register a request. Coalesces onto an existing item for the same
    /// locator; otherwise creates (or resurrects) one and admits it.
    pub(super) fn schedule(
        &mut self,
        locator: Locator,
        priority: Priority,
        subscriber: Subscriber,
    ) -> ItemState {
        if let Some(item) = self.active.iter_mut().find(|item| item.locator() == &locator) {
            item.add_subscriber(subscriber);
            item.upgrade_priority(priority);
            tracing::debug!(
                locator = %locator,
                subscribers = item.subscriber_count(),
                "coalesced onto active download"
            );
            return ItemState::Active;
        }

        if let Some(mut item) = self.waiting.remove(&locator) {
            item.add_subscriber(subscriber);
            item.upgrade_priority(priority);
            tracing::debug!(
                locator = %locator,
                priority = ?item.priority(),
                "coalesced onto queued download; moved to front of its tier"
            );
            self.waiting.push(item);
            return ItemState::Queued;
        }

        let mut item = match self.take_suspended(&locator) {
            Some(mut item) => {
                tracing::debug!(locator = %locator, ?priority, "resurrecting suspended download");
                item.set_priority(priority);
                item
            }
            None => {
                let transfer = self.provider.create(&locator);
                DownloadItem::new(locator, priority, transfer)
            }
        };
        item.add_subscriber(subscriber);
        self.admit(item)
    }

    fn take_suspended(&mut self, locator: &Locator) -> Option<DownloadItem> {
        let pos = self
            .suspended
            .iter()
            .position(|item| item.locator() == locator)?;
        Some(self.suspended.remove(pos))
    }

    /// Start immediately if a slot is free, otherwise queue in the item's tier.
    /// Active items are never evicted to make room.
    fn admit(&mut self, item: DownloadItem) -> ItemState {
        if self.has_free_slot() {
            self.activate(item);
            ItemState::Active
        } else {
            tracing::debug!(
                locator = %item.locator(),
                priority = ?item.priority(),
                waiting = self.waiting.len() + 1,
                "no free slot; queued"
            );
            self.waiting.push(item);
            ItemState::Queued
        }
    }

    fn activate(&mut self, mut item: DownloadItem) {
        let activation = self.next_activation;
        self.next_activation += 1;
        let sink = self.route.sink(item.locator().clone(), activation);
        tracing::debug!(
            locator = %item.locator(),
            activation,
            active = self.active.len() + 1,
            limit = self.limit.get(),
            "starting transfer"
        );
        item.start(activation, sink);
        self.active.push(item);
    }

    /// Fill free slots from the waiting queue.
    fn promote(&mut self) -> usize {
        let mut promoted = 0;
        while self.has_free_slot() {
            let Some(item) = self.waiting.pop_next() else {
                break;
            };
            self.activate(item);
            promoted += 1;
        }
        promoted
    }

    /// Apply a transfer's terminal outcome: fan out, forget the item, promote.
    /// Completions for items that are no longer active under the same
    /// activation (suspended, destroyed or restarted since) are ignored.
    pub(super) fn complete(&mut self, completion: Completion) {
        let Completion {
            locator,
            activation,
            outcome,
        } = completion;
        let Some(pos) = self
            .active
            .iter()
            .position(|item| item.locator() == &locator && item.activation() == activation)
        else {
            tracing::debug!(locator = %locator, activation, "ignoring stale completion");
            return;
        };
        let item = self.active.remove(pos);
        let notified = item.finish(&outcome);
        match &outcome {
            Ok(body) => tracing::info!(
                locator = %locator,
                bytes = body.len(),
                notified,
                "download completed"
            ),
            Err(e) => tracing::warn!(locator = %locator, notified, "download failed: {}", e),
        }
        self.promote();
    }

    /// Soft-cancel. Subscribers stay attached to the suspended item.
    pub(super) fn cancel(&mut self, locator: &Locator) -> CancelOutcome {
        if let Some(pos) = self.active.iter().position(|item| item.locator() == locator) {
            let mut item = self.active.remove(pos);
            item.suspend();
            self.suspended.push(item);
            let promoted = self.promote();
            tracing::debug!(locator = %locator, promoted, "suspended active download");
            return CancelOutcome::SuspendedActive;
        }
        if let Some(item) = self.waiting.remove(locator) {
            self.suspended.push(item);
            tracing::debug!(locator = %locator, "suspended queued download");
            return CancelOutcome::SuspendedQueued;
        }
        if self.suspended.iter().any(|item| item.locator() == locator) {
            tracing::debug!(locator = %locator, "cancel: already suspended");
            return CancelOutcome::AlreadySuspended;
        }
        tracing::debug!(locator = %locator, "cancel: locator not tracked");
        CancelOutcome::NotTracked
    }

    /// Memory pressure: destroy every suspended item. Returns how many.
    pub(super) fn release_suspended(&mut self) -> usize {
        let released = self.suspended.len();
        let mut discarded = 0;
        for item in self.suspended.drain(..) {
            discarded += item.destroy();
        }
        if released > 0 {
            tracing::info!(released, discarded, "released suspended downloads");
        }
        released
    }

    pub(super) fn set_limit(&mut self, limit: NonZeroUsize) -> usize {
        let previous = std::mem::replace(&mut self.limit, limit);
        let promoted = self.promote();
        tracing::debug!(
            previous = previous.get(),
            limit = limit.get(),
            promoted,
            "concurrency limit changed"
        );
        promoted
    }

    pub(super) fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            active: self.active.iter().map(|i| i.locator().clone()).collect(),
            waiting: self.waiting.promotion_order(),
            suspended: self.suspended.iter().map(|i| i.locator().clone()).collect(),
            concurrency_limit: self.limit.get(),
        }
    }
}

impl Drop for SchedulerState {
    fn drop(&mut self) {
        let items: Vec<DownloadItem> = self
            .active
            .drain(..)
            .chain(self.waiting.drain())
            .chain(self.suspended.drain(..))
            .collect();
        if items.is_empty() {
            return;
        }
        tracing::debug!(items = items.len(), "scheduler dropped; destroying remaining downloads");
        for item in items {
            item.destroy();
        }
    }
}
