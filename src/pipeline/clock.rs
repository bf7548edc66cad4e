/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Lamport clocks of consumed blocks.
//!
//! The clock of a block is one more than the greatest clock among the previous block of its feed and
//! the blocks its writer declared as dependencies. A block that causally follows another therefore
//! always has a strictly greater clock, however sparse the declared timeframes are. Clocks only depend
//! on the blocks themselves, so every replica computes the same clock for the same block.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{timeframe::Timeframe, types::data_types::FeedKey};

/// The clock of every consumed block, per feed, indexed by seq.
#[derive(Clone, PartialEq, Eq, Debug, Default, BorshSerialize, BorshDeserialize)]
pub struct LamportClocks(BTreeMap<FeedKey, Vec<u64>>);

impl LamportClocks {
    pub fn new() -> LamportClocks {
        LamportClocks::default()
    }

    /// The clock of block `seq` of `feed_key`, if that block was consumed.
    pub fn get(&self, feed_key: &FeedKey, seq: u64) -> Option<u64> {
        let index = usize::try_from(seq).ok()?;
        self.0.get(feed_key)?.get(index).copied()
    }

    /// The clock that block `seq` of `feed_key` gets if its writer declared `declared` as its causal
    /// past. Declared blocks that were not consumed (including the block itself or later blocks of its
    /// feed) do not count.
    pub fn next(&self, feed_key: &FeedKey, seq: u64, declared: &Timeframe) -> u64 {
        let previous = seq
            .checked_sub(1)
            .and_then(|previous| self.get(feed_key, previous))
            .unwrap_or(0);
        declared
            .frames()
            .filter_map(|(dependency, dependency_seq)| self.get(&dependency, dependency_seq))
            .fold(previous, u64::max)
            .saturating_add(1)
    }

    /// Record the clock of block `seq` of `feed_key`.
    ///
    /// Blocks before `seq` whose clocks are unknown are given the last known clock of the feed.
    pub fn record(&mut self, feed_key: FeedKey, seq: u64, clock: u64) {
        let clocks = self.0.entry(feed_key).or_default();
        let index = seq as usize;
        if clocks.len() < index {
            let fill = clocks.last().copied().unwrap_or(0);
            clocks.resize(index, fill);
        }
        clocks.truncate(index);
        clocks.push(clock);
    }
}
