/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Blocks stored in feeds, and the mutation envelopes carried inside them.

use std::io;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    timeframe::Timeframe,
    types::data_types::{FeedKey, ItemId, ItemType, ModelType, SignatureBytes},
};

/// One entry of a feed.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct FeedBlock {
    pub feed_key: FeedKey,
    pub seq: u64,
    /// Opaque to the feed. Blocks in space feeds carry an encoded [`MutationEnvelope`].
    pub data: Vec<u8>,
    /// Signature by the feed's designated writer over [`signing_message`](Self::signing_message).
    pub signature: SignatureBytes,
}

impl FeedBlock {
    /// Decode the [`MutationEnvelope`] carried in this block.
    pub fn envelope(&self) -> io::Result<MutationEnvelope> {
        MutationEnvelope::decode(&self.data)
    }

    /// The bytes that the designated writer signs for the block at `seq` of `feed_key`.
    pub fn signing_message(feed_key: &FeedKey, seq: u64, data: &[u8]) -> Vec<u8> {
        let mut message = Vec::with_capacity(32 + 8 + data.len());
        message.extend_from_slice(&feed_key.bytes());
        message.extend_from_slice(&seq.to_le_bytes());
        message.extend_from_slice(data);
        message
    }
}

/// A mutation of a single item, together with the causal dependencies of the mutation.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct MutationEnvelope {
    pub item_id: ItemId,
    /// The blocks that must be applied before this mutation may be applied. Writers stamp this with
    /// the space's timeframe at the moment the mutation is written.
    pub timeframe: Timeframe,
    pub payload: EnvelopePayload,
}

impl MutationEnvelope {
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        self.try_to_vec()
    }

    pub fn decode(bytes: &[u8]) -> io::Result<MutationEnvelope> {
        MutationEnvelope::try_from_slice(bytes)
    }
}

#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub enum EnvelopePayload {
    /// Create the item.
    Genesis(GenesisPayload),
    /// Model-specific mutation of an existing item.
    Mutation(Vec<u8>),
}

#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct GenesisPayload {
    pub item_type: ItemType,
    pub model_type: ModelType,
    pub parent_id: Option<ItemId>,
    /// A mutation applied to the item's initial state in the same step that creates the item.
    pub mutation: Option<Vec<u8>>,
}
