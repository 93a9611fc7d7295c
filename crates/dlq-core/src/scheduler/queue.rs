//! Waiting queue with a forced tier ahead of a normal tier.
//!
//! Within a tier the back of the deque is the most recently touched item and
//! is promoted first. Touching an item (re-request, priority bump) removes it
//! and pushes it again, moving it to the back of its tier.

use std::collections::VecDeque;

use crate::item::DownloadItem;
use crate::locator::Locator;

use super::Priority;

#[derive(Debug, Default)]
pub(super) struct WaitingQueue {
    forced: VecDeque<DownloadItem>,
    normal: VecDeque<DownloadItem>,
}

impl WaitingQueue {
    fn tier_mut(&mut self, priority: Priority) -> &mut VecDeque<DownloadItem> {
        match priority {
            Priority::Forced => &mut self.forced,
            Priority::Normal => &mut self.normal,
        }
    }

    pub(super) fn len(&self) -> usize {
        self.forced.len() + self.normal.len()
    }

    #[cfg(test)]
    pub(super) fn is_empty(&self) -> bool {
        self.forced.is_empty() && self.normal.is_empty()
    }

    pub(super) fn contains(&self, locator: &Locator) -> bool {
        self.forced
            .iter()
            .chain(self.normal.iter())
            .any(|item| item.locator() == locator)
    }

    pub(super) fn priority_of(&self, locator: &Locator) -> Option<Priority> {
        self.forced
            .iter()
            .chain(self.normal.iter())
            .find(|item| item.locator() == locator)
            .map(DownloadItem::priority)
    }

    /// Push to the most-recently-touched end of the item's tier.
    pub(super) fn push(&mut self, item: DownloadItem) {
        self.tier_mut(item.priority()).push_back(item);
    }

    pub(super) fn remove(&mut self, locator: &Locator) -> Option<DownloadItem> {
        for tier in [&mut self.forced, &mut self.normal] {
            if let Some(pos) = tier.iter().position(|item| item.locator() == locator) {
                return tier.remove(pos);
            }
        }
        None
    }

    /// Next item to promote: forced tier first, most recently touched first.
    pub(super) fn pop_next(&mut self) -> Option<DownloadItem> {
        self.forced.pop_back().or_else(|| self.normal.pop_back())
    }

    /// Locators in promotion order (next to be promoted first).
    pub(super) fn promotion_order(&self) -> Vec<Locator> {
        self.forced
            .iter()
            .rev()
            .chain(self.normal.iter().rev())
            .map(|item| item.locator().clone())
            .collect()
    }

    pub(super) fn drain(&mut self) -> impl Iterator<Item = DownloadItem> + '_ {
        self.forced.drain(..).chain(self.normal.drain(..))
    }
}
