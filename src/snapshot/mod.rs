/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Content-addressed persistence of a space's state.
//!
//! A [`Snapshot`] captures a space's items together with the timeframe at the instant they were
//! captured. Snapshots are stored in a [`BlobStore`] under the SHA-256 hash of their Borsh encoding
//! (their [`SnapshotId`]), so saving the same state twice stores one blob, and a blob that does not
//! hash to its id is detected as corrupted on load.
//!
//! Restoring a space means loading its [latest](SnapshotManager::latest) snapshot and reading every
//! feed from the block after the snapshot's timeframe.

use std::fmt::{self, Display, Formatter};
use std::io;

use crate::types::data_types::{CryptoHash, ItemId};

pub mod fs_store;
pub use fs_store::FsBlobStore;

pub mod manager;
pub use manager::SnapshotManager;

pub mod pluggables;
pub use pluggables::{BlobStore, BlobStoreError, RemoteBlobSource};

pub mod types;
pub use types::{Snapshot, SnapshotInfo};

/// The SHA-256 hash of a snapshot's encoding.
pub type SnapshotId = CryptoHash;

#[derive(Debug)]
pub enum SnapshotError {
    /// Neither the local blob store nor the remote source has the snapshot.
    NotFound(SnapshotId),
    BlobStore(BlobStoreError),
    Encode(io::Error),
    Decode(io::Error),
    /// The stored bytes do not hash to the id they were stored under.
    Corrupted {
        expected: SnapshotId,
        actual: SnapshotId,
    },
    /// The snapshot lists the same item more than once.
    DuplicateItem(ItemId),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::NotFound(id) => write!(f, "snapshot {} not found", id),
            SnapshotError::BlobStore(err) => write!(f, "blob store error: {}", err),
            SnapshotError::Encode(err) => write!(f, "failed to encode snapshot: {}", err),
            SnapshotError::Decode(err) => write!(f, "failed to decode snapshot: {}", err),
            SnapshotError::Corrupted { expected, actual } => write!(
                f,
                "snapshot {} is corrupted: its contents hash to {}",
                expected, actual
            ),
            SnapshotError::DuplicateItem(item_id) => {
                write!(f, "snapshot contains item {} more than once", item_id)
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::BlobStore(err) => Some(err),
            SnapshotError::Encode(err) | SnapshotError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BlobStoreError> for SnapshotError {
    fn from(err: BlobStoreError) -> Self {
        SnapshotError::BlobStore(err)
    }
}
