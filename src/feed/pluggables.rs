/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Trait for pluggable feed persistence.

use std::fmt::{self, Display, Formatter};
use std::io;

use crate::types::data_types::FeedKey;

use super::messages::FeedBlock;

/// Durable storage for the blocks of a single feed.
///
/// Implementations only need to store and return blocks by position. Ordering, signature checks, and
/// waking readers are done by [`Feed`](super::Feed), which serializes all access to its storage.
pub trait FeedStorage: Send + 'static {
    /// Persist `block` at position `block.seq`, which is always equal to the current `len()`.
    fn append(&mut self, block: &FeedBlock) -> io::Result<()>;

    /// Get the block at position `seq`, or `None` if no block has been stored there.
    fn get(&self, seq: u64) -> io::Result<Option<FeedBlock>>;

    /// The number of blocks stored.
    fn len(&self) -> io::Result<u64>;
}

#[derive(Debug)]
pub enum FeedError {
    /// The feed's storage failed.
    Io(io::Error),
    /// `seq` is not less than the feed's current length.
    OutOfRange { seq: u64, length: u64 },
    /// A replicated block did not extend the feed by exactly one.
    UnexpectedSeq { expected: u64, got: u64 },
    /// A replicated block was not signed by the feed's designated writer.
    InvalidSignature { seq: u64 },
    /// A replicated block belongs to a different feed.
    WrongFeed { expected: FeedKey, got: FeedKey },
    /// The storage returned no block at a position below the feed's length.
    MissingBlock { seq: u64 },
}

impl Display for FeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Io(err) => write!(f, "feed storage error: {}", err),
            FeedError::OutOfRange { seq, length } => {
                write!(f, "block {} is out of range for a feed of length {}", seq, length)
            }
            FeedError::UnexpectedSeq { expected, got } => {
                write!(f, "expected block {}, got block {}", expected, got)
            }
            FeedError::InvalidSignature { seq } => {
                write!(f, "block {} has an invalid signature", seq)
            }
            FeedError::WrongFeed { expected, got } => {
                write!(f, "block of feed {} offered to feed {}", got, expected)
            }
            FeedError::MissingBlock { seq } => {
                write!(f, "storage has no block {} although the feed is longer", seq)
            }
        }
    }
}

impl std::error::Error for FeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FeedError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FeedError {
    fn from(err: io::Error) -> Self {
        FeedError::Io(err)
    }
}
