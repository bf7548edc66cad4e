/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The synchronous core of the pipeline: per-feed queues of blocks waiting to be applied, and the
//! rules that decide which block is applied next and what applying it does.
//!
//! ## Ordering
//!
//! Blocks of one feed are applied strictly in sequence order: only the head of each feed's queue is a
//! candidate. A head is ready when the causal dependencies declared in its envelope are satisfied by
//! the space's timeframe. Heads that are not ready stay buffered and are reconsidered every time the
//! timeframe advances.
//!
//! ## Outcomes
//!
//! | Block | Outcome | Timeframe advances |
//! |---|---|---|
//! | Genesis of a new item | [`Applied`](BlockOutcome::Applied) | yes |
//! | Mutation of a known item | [`Applied`](BlockOutcome::Applied) | yes |
//! | Envelope that cannot be decoded or depends on itself | [`Skipped`](BlockOutcome::Skipped) | yes |
//! | Mutation of (or genesis under) an unknown item | [`Skipped`](BlockOutcome::Skipped) | yes |
//! | Mutation that the item's model rejects | [`Skipped`](BlockOutcome::Skipped) | yes |
//! | Genesis of an existing item | [`Rejected`](BlockOutcome::Rejected); the feed halts | no |
//!
//! Every consumed block gets a [Lamport clock](super::clock::LamportClocks), which its mutation
//! carries in its [`MutationMeta`] so that models can order it against other writes.

use std::{
    collections::{BTreeMap, VecDeque},
    fmt::{self, Display, Formatter},
};

use crate::{
    feed::{EnvelopePayload, FeedBlock, MutationEnvelope},
    item_store::{Item, ItemStoreError},
    model::{registry::ModelRegistry, MutationMeta},
    timeframe::Timeframe,
    types::data_types::{FeedKey, ItemId},
};

use super::state::SpaceState;

/// Buffers blocks per feed and applies them to a [`SpaceState`] in causal order.
///
/// `MutationProcessor` does no locking and spawns no threads, so replay can be driven directly:
///
/// ```ignore
/// let mut processor = MutationProcessor::new(registry);
/// let mut state = SpaceState::new();
/// for block in blocks {
///     processor.enqueue(block, state.timeframe());
/// }
/// let processed = processor.process_ready(&mut state);
/// ```
pub struct MutationProcessor {
    registry: ModelRegistry,
    queues: BTreeMap<FeedKey, VecDeque<QueuedBlock>>,
    /// Feeds that stopped at a rejected block, and the seq of that block.
    halted: BTreeMap<FeedKey, u64>,
}

struct QueuedBlock {
    block: FeedBlock,
    envelope: Result<MutationEnvelope, String>,
}

impl MutationProcessor {
    pub fn new(registry: ModelRegistry) -> MutationProcessor {
        MutationProcessor {
            registry,
            queues: BTreeMap::new(),
            halted: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Buffer `block` behind the blocks of its feed that are already buffered.
    ///
    /// The block is dropped, and `false` returned, if it does not directly follow the last block of
    /// its feed that was either applied (according to `current`) or buffered, or if its feed is halted.
    /// This makes delivering the same block twice harmless.
    pub fn enqueue(&mut self, block: FeedBlock, current: &Timeframe) -> bool {
        if self.halted.contains_key(&block.feed_key) {
            return false;
        }

        let queue = self.queues.entry(block.feed_key).or_default();
        let expected = match queue.back() {
            Some(last) => last.block.seq + 1,
            None => current.get(&block.feed_key).map_or(0, |seq| seq + 1),
        };
        if block.seq != expected {
            log::debug!(
                "Dropping block {} of feed {}: expected block {}",
                block.seq,
                block.feed_key,
                expected
            );
            return false;
        }

        let envelope = block.envelope().map_err(|err| err.to_string());
        queue.push_back(QueuedBlock { block, envelope });
        true
    }

    /// The number of blocks buffered across all feeds.
    pub fn buffered(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// The dependencies that the head of each feed's queue is still waiting for.
    pub fn missing(&self, current: &Timeframe) -> Timeframe {
        let waiting: Vec<Timeframe> = self
            .queues
            .values()
            .filter_map(|queue| queue.front())
            .filter_map(|queued| queued.envelope.as_ref().ok())
            .map(|envelope| Timeframe::dependencies(&envelope.timeframe, current))
            .collect();
        Timeframe::merge(&waiting)
    }

    /// If block `seq` of `feed_key` is still buffered, the dependencies it is waiting for. These may be
    /// empty if the block is only waiting behind an earlier block of its feed.
    pub fn pending(&self, feed_key: &FeedKey, seq: u64, current: &Timeframe) -> Option<Timeframe> {
        let queued = self
            .queues
            .get(feed_key)?
            .iter()
            .find(|queued| queued.block.seq == seq)?;
        Some(match &queued.envelope {
            Ok(envelope) => Timeframe::dependencies(&envelope.timeframe, current),
            Err(_) => Timeframe::new(),
        })
    }

    /// Feeds that halted at a rejected block, with the seq of that block.
    pub fn halted(&self) -> &BTreeMap<FeedKey, u64> {
        &self.halted
    }

    /// Apply the head of the first feed (in feed key order) whose head is ready. Returns `None` if no
    /// head is ready.
    pub fn process_next(&mut self, state: &mut SpaceState) -> Option<ProcessedBlock> {
        let feed_key = self
            .queues
            .iter()
            .find(|(_, queue)| {
                queue
                    .front()
                    .is_some_and(|queued| is_ready(queued, &state.timeframe))
            })
            .map(|(feed_key, _)| *feed_key)?;
        let queued = self.queues.get_mut(&feed_key)?.pop_front()?;

        let processed = self.apply(queued, state);
        if let BlockOutcome::Rejected(_) = processed.outcome {
            self.halted.insert(processed.feed_key, processed.seq);
            self.queues.remove(&processed.feed_key);
        }
        Some(processed)
    }

    /// Apply ready heads until none is left.
    pub fn process_ready(&mut self, state: &mut SpaceState) -> Vec<ProcessedBlock> {
        let mut processed = Vec::new();
        while let Some(block) = self.process_next(state) {
            processed.push(block);
        }
        processed
    }

    /// Apply one block, then advance the timeframe and record the block's clock, unless the block is
    /// rejected.
    fn apply(&self, queued: QueuedBlock, state: &mut SpaceState) -> ProcessedBlock {
        let QueuedBlock { block, envelope } = queued;
        let feed_key = block.feed_key;
        let seq = block.seq;
        let clock = match &envelope {
            Ok(envelope) => state.clocks.next(&feed_key, seq, &envelope.timeframe),
            Err(_) => state.clocks.next(&feed_key, seq, &Timeframe::new()),
        };

        let (item_id, outcome) = match envelope {
            Err(reason) => (None, BlockOutcome::Skipped(SkipReason::MalformedEnvelope(reason))),
            Ok(envelope) if depends_on_itself(&envelope, feed_key, seq) => (
                Some(envelope.item_id),
                BlockOutcome::Skipped(SkipReason::SelfDependency),
            ),
            Ok(MutationEnvelope {
                item_id,
                timeframe,
                payload,
            }) => {
                let meta = MutationMeta {
                    feed_key,
                    seq,
                    timeframe,
                    clock,
                };
                let outcome = match payload {
                    EnvelopePayload::Genesis(genesis) => match state.items.apply_genesis(
                        &self.registry,
                        item_id.clone(),
                        genesis.item_type,
                        genesis.model_type,
                        genesis.parent_id,
                        genesis.mutation.as_deref(),
                        &meta,
                    ) {
                        Ok(item) => BlockOutcome::Applied {
                            item: item.clone(),
                            genesis: true,
                        },
                        Err(err) => Self::failed(err),
                    },
                    EnvelopePayload::Mutation(mutation) => {
                        match state
                            .items
                            .apply_mutation(&self.registry, &item_id, &mutation, &meta)
                        {
                            Ok(item) => BlockOutcome::Applied {
                                item: item.clone(),
                                genesis: false,
                            },
                            Err(err) => Self::failed(err),
                        }
                    }
                };
                (Some(item_id), outcome)
            }
        };

        if !matches!(outcome, BlockOutcome::Rejected(_)) {
            state.timeframe = state.timeframe.with(feed_key, seq);
            state.clocks.record(feed_key, seq, clock);
        }

        ProcessedBlock {
            feed_key,
            seq,
            item_id,
            outcome,
            timeframe: state.timeframe.clone(),
        }
    }

    fn failed(err: ItemStoreError) -> BlockOutcome {
        match err {
            ItemStoreError::AlreadyExists(item_id) => {
                BlockOutcome::Rejected(RejectReason::DuplicateGenesis(item_id))
            }
            ItemStoreError::NotFound(item_id) => {
                BlockOutcome::Skipped(SkipReason::UnknownItem(item_id))
            }
            ItemStoreError::ParentNotFound { parent_id, .. } => {
                BlockOutcome::Skipped(SkipReason::UnknownItem(parent_id))
            }
            ItemStoreError::Model { item_id, error } => {
                BlockOutcome::Skipped(SkipReason::MalformedMutation {
                    item_id,
                    reason: error.to_string(),
                })
            }
        }
    }
}

fn is_ready(queued: &QueuedBlock, current: &Timeframe) -> bool {
    match &queued.envelope {
        Ok(envelope) => {
            depends_on_itself(envelope, queued.block.feed_key, queued.block.seq)
                || envelope.timeframe.is_satisfied_by(current)
        }
        Err(_) => true,
    }
}

/// An envelope that requires its own block (or a later block of its own feed) can never be satisfied.
fn depends_on_itself(envelope: &MutationEnvelope, feed_key: FeedKey, seq: u64) -> bool {
    envelope
        .timeframe
        .get(&feed_key)
        .is_some_and(|required| required >= seq)
}

/// The result of processing one block.
#[derive(Clone, PartialEq, Debug)]
pub struct ProcessedBlock {
    pub feed_key: FeedKey,
    pub seq: u64,
    /// The item named by the block's envelope, if the envelope could be decoded.
    pub item_id: Option<ItemId>,
    pub outcome: BlockOutcome,
    /// The space's timeframe after processing the block.
    pub timeframe: Timeframe,
}

#[derive(Clone, PartialEq, Debug)]
pub enum BlockOutcome {
    /// The block created (`genesis`) or changed `item`, which is the item's new value.
    Applied { item: Item, genesis: bool },
    /// The block was consumed without changing any item.
    Skipped(SkipReason),
    /// The block was not consumed and its feed halted.
    Rejected(RejectReason),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SkipReason {
    MalformedEnvelope(String),
    SelfDependency,
    UnknownItem(ItemId),
    MalformedMutation { item_id: ItemId, reason: String },
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MalformedEnvelope(reason) => write!(f, "malformed envelope: {}", reason),
            SkipReason::SelfDependency => f.write_str("envelope depends on its own block"),
            SkipReason::UnknownItem(item_id) => write!(f, "unknown item {}", item_id),
            SkipReason::MalformedMutation { item_id, reason } => {
                write!(f, "malformed mutation of item {}: {}", item_id, reason)
            }
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RejectReason {
    DuplicateGenesis(ItemId),
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::DuplicateGenesis(item_id) => {
                write!(f, "duplicate genesis of item {}", item_id)
            }
        }
    }
}
