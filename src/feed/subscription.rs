/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Ordered, suspending reads of a feed.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use super::{handle::Feed, messages::FeedBlock, pluggables::FeedError};

/// An infinite, ordered stream of the blocks of one feed, starting from a chosen sequence number.
///
/// Blocks are delivered exactly once and in sequence order. When the next block is not yet in the
/// feed, the subscription suspends on the feed's condition variable until the block is appended or
/// replicated, or until the subscription is [closed](SubscriptionHandle::close).
///
/// A failed read does not advance the cursor, so the next call retries the same block.
pub struct FeedSubscription {
    feed: Feed,
    cursor: u64,
    closed: Arc<AtomicBool>,
}

impl FeedSubscription {
    pub(super) fn new(feed: Feed, from_seq: u64) -> FeedSubscription {
        FeedSubscription {
            feed,
            cursor: from_seq,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The sequence number of the next block this subscription will deliver.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Get a handle that can close this subscription from another thread.
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            feed: self.feed.clone(),
            closed: self.closed.clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait at most `timeout` for the next block.
    ///
    /// Returns `Ok(None)` if the timeout elapses or the subscription is closed before a block becomes
    /// available.
    pub fn next_timeout(&mut self, timeout: Duration) -> Result<Option<FeedBlock>, FeedError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.feed.inner.lock();
        loop {
            if self.is_closed() {
                return Ok(None);
            }

            if self.cursor < state.length {
                let block = state
                    .storage
                    .get(self.cursor)?
                    .ok_or(FeedError::MissingBlock { seq: self.cursor })?;
                self.cursor += 1;
                return Ok(Some(block));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            state = match self.feed.inner.appended.wait_timeout(state, deadline - now) {
                Ok((state, _)) => state,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Close this subscription. Blocks stop being delivered; the feed itself is unaffected.
    pub fn close(&self) {
        self.handle().close()
    }
}

impl Iterator for FeedSubscription {
    type Item = Result<FeedBlock, FeedError>;

    /// Block until the next block is available. Returns `None` only once the subscription is closed.
    fn next(&mut self) -> Option<Self::Item> {
        let mut state = self.feed.inner.lock();
        loop {
            if self.is_closed() {
                return None;
            }

            if self.cursor < state.length {
                let block = match state.storage.get(self.cursor) {
                    Ok(Some(block)) => block,
                    Ok(None) => return Some(Err(FeedError::MissingBlock { seq: self.cursor })),
                    Err(err) => return Some(Err(FeedError::Io(err))),
                };
                self.cursor += 1;
                return Some(Ok(block));
            }

            state = self
                .feed
                .inner
                .appended
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

/// Closes a [`FeedSubscription`], possibly from a different thread than the one reading it.
#[derive(Clone)]
pub struct SubscriptionHandle {
    feed: Feed,
    closed: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Take the feed's lock so that a reader between its closed check and its wait cannot miss
        // the notification.
        let _state = self.feed.inner.lock();
        self.feed.inner.appended.notify_all();
    }
}
