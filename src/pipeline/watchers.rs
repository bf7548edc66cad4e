/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Per-item change subscriptions.

use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Mutex, PoisonError,
    },
    time::Duration,
};

use crate::{item_store::Item, types::data_types::ItemId};

/// The senders of every live [`ItemSubscription`] of a space, keyed by the watched item.
#[derive(Default)]
pub(crate) struct ItemWatchers(Mutex<HashMap<ItemId, Vec<Sender<Item>>>>);

impl ItemWatchers {
    pub(crate) fn watch(&self, item_id: ItemId) -> ItemSubscription {
        let (sender, receiver) = mpsc::channel();
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(item_id.clone())
            .or_default()
            .push(sender);
        ItemSubscription { item_id, receiver }
    }

    /// Send the new value of `item` to its watchers, forgetting watchers that have gone away.
    pub(crate) fn notify(&self, item: &Item) {
        let mut watchers = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(senders) = watchers.get_mut(item.id()) {
            senders.retain(|sender| sender.send(item.clone()).is_ok());
            if senders.is_empty() {
                watchers.remove(item.id());
            }
        }
    }

    /// Drop every sender, which ends every subscription.
    pub(crate) fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// The successive values of one item, delivered every time a block changes it.
///
/// Iterating blocks until the next change. The subscription ends when the space closes; drop it or
/// call [`unsubscribe`](Self::unsubscribe) to stop earlier.
pub struct ItemSubscription {
    item_id: ItemId,
    receiver: Receiver<Item>,
}

impl ItemSubscription {
    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    /// Block until the next change. Returns `None` once the space has closed.
    pub fn recv(&self) -> Option<Item> {
        self.receiver.recv().ok()
    }

    /// Wait at most `timeout` for the next change.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Item> {
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Get the next change if one has already been delivered.
    pub fn try_recv(&self) -> Option<Item> {
        self.receiver.try_recv().ok()
    }

    /// Stop receiving changes. The space forgets the subscription on its next change to the item.
    pub fn unsubscribe(self) {
        drop(self.receiver)
    }
}

impl Iterator for ItemSubscription {
    type Item = Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}
