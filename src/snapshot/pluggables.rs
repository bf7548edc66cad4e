/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable snapshot persistence.

use std::fmt::{self, Display, Formatter};
use std::io;

use super::{types::SnapshotInfo, SnapshotId};

/// Local, content-addressed storage of snapshot blobs.
///
/// Clones of a `BlobStore` must refer to the same storage: the coordinator thread saves automatic
/// snapshots through its own clone.
pub trait BlobStore: Clone + Send + 'static {
    fn get(&self, id: &SnapshotId) -> Result<Option<Vec<u8>>, BlobStoreError>;

    /// Store `bytes` under `id`. Storing under an id that is already present must leave the store
    /// unchanged or overwrite it with the same bytes.
    fn set(&mut self, id: &SnapshotId, bytes: &[u8]) -> Result<(), BlobStoreError>;

    fn list(&self) -> Result<Vec<SnapshotInfo>, BlobStoreError>;

    fn contains(&self, id: &SnapshotId) -> Result<bool, BlobStoreError> {
        Ok(self.get(id)?.is_some())
    }
}

/// Fetches snapshot blobs that are not in the local [`BlobStore`], e.g., from other peers.
pub trait RemoteBlobSource: Send + Sync + 'static {
    fn fetch(&self, id: &SnapshotId) -> Result<Option<Vec<u8>>, BlobStoreError>;
}

#[derive(Debug)]
pub enum BlobStoreError {
    Io(io::Error),
    Unavailable(String),
}

impl Display for BlobStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BlobStoreError::Io(err) => write!(f, "{}", err),
            BlobStoreError::Unavailable(reason) => write!(f, "unavailable: {}", reason),
        }
    }
}

impl std::error::Error for BlobStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobStoreError::Io(err) => Some(err),
            BlobStoreError::Unavailable(_) => None,
        }
    }
}

impl From<io::Error> for BlobStoreError {
    fn from(err: io::Error) -> Self {
        BlobStoreError::Io(err)
    }
}
