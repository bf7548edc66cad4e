/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Timeframe`] vector clock and its algebra.
//!
//! A `Timeframe` records, for each feed, the sequence number of the last block consumed from that
//! feed. Two different things are expressed with the same type:
//! 1. The **progress** of a space: the blocks of each feed that have already been applied.
//! 2. The **causal dependencies** of a mutation: the blocks its writer had observed when it wrote the
//!    mutation, all of which must be applied before the mutation is.
//!
//! An entry `(k, 0)` means "block 0 of feed `k` has been consumed", which is distinct from `k` being
//! absent ("nothing from `k` has been consumed"). The empty `Timeframe` is the origin.
//!
//! `Timeframe`s are values: every operation in this module returns a new `Timeframe` instead of
//! modifying its inputs.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::FeedKey;

/// A mapping from [`FeedKey`] to the index of the last consumed block of that feed.
#[derive(Clone, PartialEq, Eq, Hash, Default, Debug, BorshSerialize, BorshDeserialize)]
pub struct Timeframe(BTreeMap<FeedKey, u64>);

impl Timeframe {
    /// Create an empty `Timeframe`.
    pub fn new() -> Timeframe {
        Timeframe(BTreeMap::new())
    }

    /// Create a `Timeframe` from a list of `(feed_key, seq)` entries.
    ///
    /// # Errors
    ///
    /// Returns [`TimeframeError::DuplicateKey`] if `entries` names the same feed more than once.
    pub fn create(
        entries: impl IntoIterator<Item = (FeedKey, u64)>,
    ) -> Result<Timeframe, TimeframeError> {
        let mut frames = BTreeMap::new();
        for (feed_key, seq) in entries {
            if frames.insert(feed_key, seq).is_some() {
                return Err(TimeframeError::DuplicateKey(feed_key));
            }
        }
        Ok(Timeframe(frames))
    }

    /// Pointwise maximum of `timeframes`. Merging zero `Timeframe`s yields the empty `Timeframe`.
    pub fn merge<'a>(timeframes: impl IntoIterator<Item = &'a Timeframe>) -> Timeframe {
        let mut frames: BTreeMap<FeedKey, u64> = BTreeMap::new();
        for timeframe in timeframes {
            for (feed_key, seq) in &timeframe.0 {
                frames
                    .entry(*feed_key)
                    .and_modify(|current| *current = (*current).max(*seq))
                    .or_insert(*seq);
            }
        }
        Timeframe(frames)
    }

    /// The entries of `a` that are not yet covered by `b`, i.e., those whose seq is strictly greater
    /// than `b`'s seq for the same key. A key absent from `b` counts as `-1`, so every entry of `a`
    /// whose key `b` lacks is a dependency.
    pub fn dependencies(a: &Timeframe, b: &Timeframe) -> Timeframe {
        Timeframe(
            a.0.iter()
                .filter(|(feed_key, seq)| match b.0.get(feed_key) {
                    Some(have) => *seq > have,
                    None => true,
                })
                .map(|(feed_key, seq)| (*feed_key, *seq))
                .collect(),
        )
    }

    /// A copy of this `Timeframe` without the entries for `keys`.
    pub fn remove_keys<'a>(&self, keys: impl IntoIterator<Item = &'a FeedKey>) -> Timeframe {
        let mut frames = self.0.clone();
        for feed_key in keys {
            frames.remove(feed_key);
        }
        Timeframe(frames)
    }

    /// Whether every block required by `self` has been consumed according to `have`.
    ///
    /// A required `(k, 0)` is not satisfied by the absence of `k` in `have`.
    pub fn is_satisfied_by(&self, have: &Timeframe) -> bool {
        self.0
            .iter()
            .all(|(feed_key, seq)| matches!(have.0.get(feed_key), Some(h) if h >= seq))
    }

    /// A copy of this `Timeframe` with `feed_key` raised to at least `seq`.
    pub fn with(&self, feed_key: FeedKey, seq: u64) -> Timeframe {
        let mut frames = self.0.clone();
        frames
            .entry(feed_key)
            .and_modify(|current| *current = (*current).max(seq))
            .or_insert(seq);
        Timeframe(frames)
    }

    pub fn get(&self, feed_key: &FeedKey) -> Option<u64> {
        self.0.get(feed_key).copied()
    }

    /// Iterate over the `(feed_key, seq)` entries in ascending key order.
    pub fn frames(&self) -> impl Iterator<Item = (FeedKey, u64)> + '_ {
        self.0.iter().map(|(feed_key, seq)| (*feed_key, *seq))
    }

    pub fn keys(&self) -> impl Iterator<Item = &FeedKey> + '_ {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of blocks covered by this `Timeframe`, i.e., the sum of `seq + 1` over all entries.
    pub fn total_blocks(&self) -> u64 {
        self.0
            .values()
            .fold(0u64, |total, seq| total.saturating_add(seq.saturating_add(1)))
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, (feed_key, seq)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", feed_key, seq)?;
        }
        f.write_str(")")
    }
}

impl FromIterator<(FeedKey, u64)> for Timeframe {
    /// Collect entries into a `Timeframe`, keeping the highest seq when a key repeats.
    fn from_iter<T: IntoIterator<Item = (FeedKey, u64)>>(iter: T) -> Self {
        let mut timeframe = Timeframe::new();
        for (feed_key, seq) in iter {
            timeframe
                .0
                .entry(feed_key)
                .and_modify(|current| *current = (*current).max(seq))
                .or_insert(seq);
        }
        timeframe
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeframeError {
    DuplicateKey(FeedKey),
}

impl Display for TimeframeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TimeframeError::DuplicateKey(feed_key) => {
                write!(f, "feed key {} appears more than once", feed_key)
            }
        }
    }
}

impl std::error::Error for TimeframeError {}
