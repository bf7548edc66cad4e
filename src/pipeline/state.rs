/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The state of a space, and the lock that the pipeline and its readers share it through.

use std::{
    collections::BTreeSet,
    sync::{Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::{Duration, Instant},
};

use crate::{
    item_store::{Item, ItemFilter, ItemQuery, ItemStore, ItemStoreError},
    timeframe::Timeframe,
    types::data_types::{FeedKey, ItemId},
};

use super::clock::LamportClocks;

/// The items of a space together with the timeframe of the blocks that produced them.
///
/// `items` is always exactly the result of applying the blocks covered by `timeframe`, and `clocks`
/// holds the Lamport clock of every one of those blocks.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SpaceState {
    pub(crate) timeframe: Timeframe,
    pub(crate) clocks: LamportClocks,
    pub(crate) items: ItemStore,
}

impl SpaceState {
    /// The empty state at the origin timeframe.
    pub fn new() -> SpaceState {
        SpaceState::default()
    }

    pub fn from_parts(timeframe: Timeframe, clocks: LamportClocks, items: ItemStore) -> SpaceState {
        SpaceState {
            timeframe,
            clocks,
            items,
        }
    }

    pub fn timeframe(&self) -> &Timeframe {
        &self.timeframe
    }

    pub fn clocks(&self) -> &LamportClocks {
        &self.clocks
    }

    pub fn items(&self) -> &ItemStore {
        &self.items
    }
}

/// Lifecycle of a space's pipeline.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpaceStatus {
    Closed,
    Opening,
    Open,
    Closing,
}

/// [`SpaceState`] behind a single readers-writer lock, plus a condition variable that is notified
/// every time the pipeline advances the state's timeframe, reports a stall, or halts a feed.
pub(crate) struct SharedSpaceState {
    state: RwLock<SpaceState>,
    progress: Mutex<Progress>,
    advanced: Condvar,
}

#[derive(Default)]
struct Progress {
    generation: u64,
    stalls: u64,
    /// Feeds that halted at a rejected block. Their remaining blocks are never applied.
    halted: BTreeSet<FeedKey>,
}

/// How a wait for a target timeframe ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum WaitOutcome {
    Reached,
    /// The pipeline stalled before reaching the target.
    Stalled,
    TimedOut,
}

impl SharedSpaceState {
    pub(crate) fn new(state: SpaceState) -> SharedSpaceState {
        SharedSpaceState {
            state: RwLock::new(state),
            progress: Mutex::new(Progress::default()),
            advanced: Condvar::new(),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, SpaceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, SpaceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole state, e.g., with one restored from a snapshot.
    pub(crate) fn replace(&self, state: SpaceState) {
        *self.write() = state;
        self.notify_progress();
    }

    /// Wake every thread blocked in [`wait_until`](Self::wait_until). Must be called after the write
    /// lock has been released.
    pub(crate) fn notify_progress(&self) {
        let mut progress = self.lock_progress();
        progress.generation = progress.generation.wrapping_add(1);
        self.advanced.notify_all();
    }

    pub(crate) fn notify_stall(&self) {
        let mut progress = self.lock_progress();
        progress.stalls = progress.stalls.wrapping_add(1);
        self.advanced.notify_all();
    }

    pub(crate) fn notify_halted(&self, feed_key: FeedKey) {
        let mut progress = self.lock_progress();
        progress.halted.insert(feed_key);
        self.advanced.notify_all();
    }

    /// Forget halted feeds. A new pipeline halts them again when it reaches their rejected blocks.
    pub(crate) fn clear_halted(&self) {
        self.lock_progress().halted.clear();
    }

    /// Block until the state's timeframe covers `target`, or until `timeout` elapses. Returns whether
    /// `target` was reached.
    pub(crate) fn wait_until(&self, target: &Timeframe, timeout: Duration) -> bool {
        self.wait(target, timeout, false) == WaitOutcome::Reached
    }

    /// Like [`wait_until`](Self::wait_until), but blocks of halted feeds are not waited for, and the
    /// wait ends early if the pipeline reports a stall.
    pub(crate) fn wait_for_replay(&self, target: &Timeframe, timeout: Duration) -> WaitOutcome {
        self.wait(target, timeout, true)
    }

    fn wait(&self, target: &Timeframe, timeout: Duration, break_on_stall: bool) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut progress = self.lock_progress();
        let stalls = progress.stalls;
        loop {
            let remaining = if break_on_stall {
                target.remove_keys(&progress.halted)
            } else {
                target.clone()
            };
            if Timeframe::dependencies(&remaining, self.read().timeframe()).is_empty() {
                return WaitOutcome::Reached;
            }
            if break_on_stall && progress.stalls != stalls {
                return WaitOutcome::Stalled;
            }

            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            progress = match self.advanced.wait_timeout(progress, deadline - now) {
                Ok((progress, _)) => progress,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn lock_progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A factory for [`SpaceStateSnapshot`]s, which give consistent read access to a space's state.
#[derive(Clone)]
pub struct SpaceCamera {
    pub(crate) shared: std::sync::Arc<SharedSpaceState>,
}

impl SpaceCamera {
    /// Take a read lock on the space's state. The pipeline cannot apply blocks while the returned
    /// snapshot is alive, so drop it promptly.
    pub fn snapshot(&self) -> SpaceStateSnapshot<'_> {
        SpaceStateSnapshot(self.shared.read())
    }
}

/// A read-only, consistent view of a space's state.
pub struct SpaceStateSnapshot<'a>(RwLockReadGuard<'a, SpaceState>);

impl<'a> SpaceStateSnapshot<'a> {
    pub fn timeframe(&self) -> &Timeframe {
        self.0.timeframe()
    }

    pub fn get(&self, item_id: &ItemId) -> Result<&Item, ItemStoreError> {
        self.0.items.get(item_id)
    }

    pub fn query(&self, predicate: impl Fn(&Item) -> bool) -> ItemQuery {
        self.0.items.query(predicate)
    }

    pub fn filter(&self, filter: &ItemFilter) -> ItemQuery {
        self.0.items.filter(filter)
    }

    /// Clone the whole state out of the lock.
    pub fn to_state(&self) -> SpaceState {
        self.0.clone()
    }
}
