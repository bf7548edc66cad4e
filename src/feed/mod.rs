/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Append-only, per-writer logs of opaque blocks.
//!
//! A [`Feed`] is identified by a [`FeedKey`](crate::types::data_types::FeedKey), which is the verifying
//! key of its designated writer. Blocks are numbered by the feed itself starting at 0, and a block,
//! once appended, is never modified or removed.
//!
//! There are two ways to add blocks to a feed:
//! 1. The designated writer appends through its [`FeedWriter`], which signs every block.
//! 2. The (external) replication layer copies blocks written by remote peers into a read-only
//!    replica through [`Feed::replicate`], which checks ordering and signatures.
//!
//! Readers consume a feed in order through a [`FeedSubscription`](subscription::FeedSubscription),
//! which suspends until the next block becomes available.

pub mod handle;
pub use handle::{Feed, FeedWriter};

pub mod messages;
pub use messages::{EnvelopePayload, FeedBlock, GenesisPayload, MutationEnvelope};

pub mod mem_storage;
pub use mem_storage::MemFeedStorage;

pub mod pluggables;
pub use pluggables::{FeedError, FeedStorage};

pub mod subscription;
