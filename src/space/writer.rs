/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Writing mutations into a space through the local peer's feed.

use std::sync::Arc;

use crate::{
    feed::{EnvelopePayload, FeedWriter, GenesisPayload, MutationEnvelope},
    pipeline::state::SharedSpaceState,
    timeframe::Timeframe,
    types::data_types::{FeedKey, ItemId, ItemType, ModelType},
};

use super::SpaceError;

/// Appends mutation envelopes to the local peer's writable feed.
///
/// Every envelope is stamped with the space's timeframe at the moment it is written, so that every
/// replica applies it only after everything its writer had already seen.
pub struct SpaceWriter {
    writer: FeedWriter,
    shared: Arc<SharedSpaceState>,
}

impl SpaceWriter {
    pub(crate) fn new(writer: FeedWriter, shared: Arc<SharedSpaceState>) -> SpaceWriter {
        SpaceWriter { writer, shared }
    }

    pub fn feed_key(&self) -> FeedKey {
        self.writer.feed_key()
    }

    /// Create a new top-level item with a random id.
    pub fn create_item(
        &self,
        item_type: impl Into<ItemType>,
        model_type: impl Into<ModelType>,
        initial_mutation: Option<Vec<u8>>,
    ) -> Result<WriteReceipt, SpaceError> {
        self.write(
            ItemId::random(),
            EnvelopePayload::Genesis(GenesisPayload {
                item_type: item_type.into(),
                model_type: model_type.into(),
                parent_id: None,
                mutation: initial_mutation,
            }),
        )
    }

    /// Create a new item with a random id under `parent_id`.
    pub fn create_child_item(
        &self,
        parent_id: ItemId,
        item_type: impl Into<ItemType>,
        model_type: impl Into<ModelType>,
        initial_mutation: Option<Vec<u8>>,
    ) -> Result<WriteReceipt, SpaceError> {
        self.write(
            ItemId::random(),
            EnvelopePayload::Genesis(GenesisPayload {
                item_type: item_type.into(),
                model_type: model_type.into(),
                parent_id: Some(parent_id),
                mutation: initial_mutation,
            }),
        )
    }

    /// Append a model-specific mutation of `item_id`.
    pub fn mutate(&self, item_id: ItemId, mutation: Vec<u8>) -> Result<WriteReceipt, SpaceError> {
        self.write(item_id, EnvelopePayload::Mutation(mutation))
    }

    /// Append an envelope carrying `payload` for `item_id`.
    pub fn write(
        &self,
        item_id: ItemId,
        payload: EnvelopePayload,
    ) -> Result<WriteReceipt, SpaceError> {
        let envelope = MutationEnvelope {
            item_id: item_id.clone(),
            timeframe: self.shared.read().timeframe().clone(),
            payload,
        };
        let data = envelope.encode().map_err(SpaceError::Encode)?;
        let seq = self.writer.append(data)?;
        Ok(WriteReceipt {
            feed_key: self.writer.feed_key(),
            seq,
            item_id,
        })
    }
}

/// Where a write landed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct WriteReceipt {
    pub feed_key: FeedKey,
    pub seq: u64,
    pub item_id: ItemId,
}

impl WriteReceipt {
    /// The timeframe that covers this write. Pass it to
    /// [`Space::wait_until_timeframe`](super::Space::wait_until_timeframe) to wait until the write is
    /// applied locally.
    pub fn timeframe(&self) -> Timeframe {
        Timeframe::new().with(self.feed_key, self.seq)
    }
}
