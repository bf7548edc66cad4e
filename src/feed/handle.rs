/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Shared handles to a feed: [`Feed`] for reading and replicating, [`FeedWriter`] for appending.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::types::{
    crypto_primitives::{self, Keypair, SigningKey},
    data_types::FeedKey,
};

use super::{
    messages::FeedBlock,
    pluggables::{FeedError, FeedStorage},
    subscription::FeedSubscription,
};

/// A cheaply-cloneable handle to a feed. All clones refer to the same underlying log.
#[derive(Clone)]
pub struct Feed {
    pub(super) inner: Arc<FeedInner>,
}

pub(super) struct FeedInner {
    pub(super) key: FeedKey,
    pub(super) state: Mutex<FeedState>,
    /// Notified every time a block is added, and every time a subscription is closed.
    pub(super) appended: Condvar,
}

pub(super) struct FeedState {
    pub(super) storage: Box<dyn FeedStorage>,
    pub(super) length: u64,
}

impl FeedInner {
    pub(super) fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Feed {
    /// Open a read-only replica of the feed `feed_key`, whose blocks are kept in `storage`. Blocks
    /// already in `storage` are immediately readable.
    pub fn open_replica(
        feed_key: FeedKey,
        storage: impl FeedStorage,
    ) -> Result<Feed, FeedError> {
        let length = storage.len()?;
        Ok(Feed {
            inner: Arc::new(FeedInner {
                key: feed_key,
                state: Mutex::new(FeedState {
                    storage: Box::new(storage),
                    length,
                }),
                appended: Condvar::new(),
            }),
        })
    }

    /// Open the feed written by `signing_key`, returning a handle for reading and the feed's only
    /// [`FeedWriter`].
    pub fn create_writable(
        signing_key: SigningKey,
        storage: impl FeedStorage,
    ) -> Result<(Feed, FeedWriter), FeedError> {
        let keypair = Keypair::new(signing_key);
        let feed = Feed::open_replica(keypair.feed_key(), storage)?;
        let writer = FeedWriter {
            feed: feed.clone(),
            keypair,
        };
        Ok((feed, writer))
    }

    pub fn key(&self) -> FeedKey {
        self.inner.key
    }

    /// The number of blocks in the feed. Never decreases.
    pub fn length(&self) -> u64 {
        self.inner.lock().length
    }

    /// Get the block at `seq`.
    ///
    /// # Errors
    ///
    /// [`FeedError::OutOfRange`] if `seq >= self.length()`, and [`FeedError::Io`] if the storage fails.
    pub fn read(&self, seq: u64) -> Result<FeedBlock, FeedError> {
        let state = self.inner.lock();
        if seq >= state.length {
            return Err(FeedError::OutOfRange {
                seq,
                length: state.length,
            });
        }
        state
            .storage
            .get(seq)?
            .ok_or(FeedError::MissingBlock { seq })
    }

    /// Start reading the feed in order, from block `from_seq` onwards.
    pub fn subscribe(&self, from_seq: u64) -> FeedSubscription {
        FeedSubscription::new(self.clone(), from_seq)
    }

    /// Add a block written by a remote peer to this replica.
    ///
    /// The block is accepted only if it belongs to this feed, is the next block of the feed, and is
    /// signed by the feed's designated writer.
    pub fn replicate(&self, block: FeedBlock) -> Result<(), FeedError> {
        if block.feed_key != self.inner.key {
            return Err(FeedError::WrongFeed {
                expected: self.inner.key,
                got: block.feed_key,
            });
        }

        let mut state = self.inner.lock();
        if block.seq != state.length {
            return Err(FeedError::UnexpectedSeq {
                expected: state.length,
                got: block.seq,
            });
        }
        let message = FeedBlock::signing_message(&block.feed_key, block.seq, &block.data);
        if !crypto_primitives::verify(&block.feed_key, &message, &block.signature) {
            return Err(FeedError::InvalidSignature { seq: block.seq });
        }

        state.storage.append(&block)?;
        state.length += 1;
        drop(state);
        self.inner.appended.notify_all();
        Ok(())
    }
}

/// The designated writer of a feed. Only one exists per feed, created by [`Feed::create_writable`].
pub struct FeedWriter {
    feed: Feed,
    keypair: Keypair,
}

impl FeedWriter {
    /// Sign `data` and append it to the feed, returning the sequence number assigned to it.
    pub fn append(&self, data: Vec<u8>) -> Result<u64, FeedError> {
        let mut state = self.feed.inner.lock();
        let seq = state.length;
        let signature = self
            .keypair
            .sign(&FeedBlock::signing_message(&self.feed.inner.key, seq, &data));
        let block = FeedBlock {
            feed_key: self.feed.inner.key,
            seq,
            data,
            signature,
        };

        state.storage.append(&block)?;
        state.length += 1;
        drop(state);
        self.feed.inner.appended.notify_all();

        log::debug!("Appended block {} to feed {}", seq, self.feed.inner.key);
        Ok(seq)
    }

    pub fn feed_key(&self) -> FeedKey {
        self.feed.inner.key
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }
}
