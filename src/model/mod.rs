/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Models: the functions that give meaning to an item's mutations.
//!
//! Every item names a [`ModelType`]. The [`Model`] registered for that type in the space's
//! [`ModelRegistry`](registry::ModelRegistry) defines the item's initial state and folds each of the
//! item's mutations, in application order, into a new state. Items whose model is not registered are
//! folded by the [raw log model](raw_log::RawLogModel), which keeps the mutations as they are.
//!
//! Fold functions must be deterministic: every replica folds the same mutations in a causally
//! consistent order, and must arrive at the same state.

use std::fmt::{self, Display, Formatter};

use crate::{
    timeframe::Timeframe,
    types::data_types::{FeedKey, ModelState, ModelType},
};

pub mod object_model;

pub mod raw_log;

pub mod registry;

/// Interprets the mutations of items of one [`ModelType`].
pub trait Model: Send + Sync + 'static {
    fn model_type(&self) -> ModelType;

    /// The state of a freshly created item, before any mutation.
    fn initial_state(&self) -> ModelState;

    /// Compute the state that results from applying `mutation` to `state`.
    ///
    /// Returning an error leaves the item unchanged. The pipeline then skips the mutation.
    fn fold(
        &self,
        state: &ModelState,
        meta: &MutationMeta,
        mutation: &[u8],
    ) -> Result<ModelState, ModelError>;
}

/// Where a mutation came from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MutationMeta {
    pub feed_key: FeedKey,
    pub seq: u64,
    /// The causal dependencies that the mutation's writer declared.
    pub timeframe: Timeframe,
    /// The [Lamport clock](crate::pipeline::clock::LamportClocks) of the mutation's block.
    pub clock: u64,
}

impl MutationMeta {
    /// The [`WriteStamp`] used to order this mutation against other writes.
    pub fn stamp(&self) -> WriteStamp {
        WriteStamp {
            clock: self.clock,
            feed_key: self.feed_key,
            seq: self.seq,
        }
    }
}

/// Total order over writes that extends causality: a write that causally follows another always has a
/// strictly greater `clock`. Concurrent writes with equal clocks are ordered by feed key, then by seq.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    borsh::BorshSerialize,
    borsh::BorshDeserialize,
)]
pub struct WriteStamp {
    /// The Lamport clock of the write's block.
    pub clock: u64,
    pub feed_key: FeedKey,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The mutation could not be decoded or is not valid for the model.
    MalformedMutation(String),
    /// The stored state could not be decoded or re-encoded.
    InvalidState(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::MalformedMutation(reason) => write!(f, "malformed mutation: {}", reason),
            ModelError::InvalidState(reason) => write!(f, "invalid model state: {}", reason),
        }
    }
}

impl std::error::Error for ModelError {}
