/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::io;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    item_store::{Item, ItemStore, ItemStoreError},
    pipeline::{clock::LamportClocks, state::SpaceState},
    timeframe::Timeframe,
    types::data_types::SpaceKey,
};

use super::{SnapshotError, SnapshotId};

/// The items of a space and the timeframe that produced them.
#[derive(Clone, PartialEq, Eq, Debug, BorshSerialize, BorshDeserialize)]
pub struct Snapshot {
    pub space_key: SpaceKey,
    pub timeframe: Timeframe,
    /// The clocks of the blocks covered by `timeframe`. Writes applied after loading are ordered
    /// against the loaded items by these.
    pub clocks: LamportClocks,
    /// In ascending id order, so that equal states encode to equal bytes.
    pub items: Vec<Item>,
}

impl Snapshot {
    pub fn capture(space_key: SpaceKey, state: &SpaceState) -> Snapshot {
        Snapshot {
            space_key,
            timeframe: state.timeframe().clone(),
            clocks: state.clocks().clone(),
            items: state.items().iter().cloned().collect(),
        }
    }

    pub fn into_state(self) -> Result<SpaceState, SnapshotError> {
        let items = ItemStore::from_items(self.items).map_err(|err| match err {
            ItemStoreError::AlreadyExists(item_id) => SnapshotError::DuplicateItem(item_id),
            other => SnapshotError::Decode(io::Error::new(io::ErrorKind::InvalidData, other)),
        })?;
        Ok(SpaceState::from_parts(self.timeframe, self.clocks, items))
    }

    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        self.try_to_vec().map_err(SnapshotError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Snapshot, SnapshotError> {
        Snapshot::try_from_slice(bytes).map_err(SnapshotError::Decode)
    }
}

/// A snapshot blob available in a [`BlobStore`](super::BlobStore).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SnapshotInfo {
    pub id: SnapshotId,
    /// Size of the encoded snapshot, in bytes.
    pub size: u64,
}
