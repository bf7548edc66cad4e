//! Simple, volatile, in-memory implementations of [`BlobStore`] and [`RemoteBlobSource`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use echo_rs::snapshot::{BlobStore, BlobStoreError, RemoteBlobSource, SnapshotId, SnapshotInfo};

/// An in-memory implementation of [`BlobStore`]. Clones share their contents.
#[derive(Clone, Default)]
pub(crate) struct MemBlobStore(Arc<Mutex<HashMap<SnapshotId, Vec<u8>>>>);

impl MemBlobStore {
    /// Create a new, empty `MemBlobStore`.
    pub(crate) fn new() -> MemBlobStore {
        MemBlobStore::default()
    }

    /// Overwrite the blob stored under `id` with `bytes`, bypassing content addressing.
    pub(crate) fn tamper(&self, id: &SnapshotId, bytes: Vec<u8>) {
        self.0.lock().unwrap().insert(*id, bytes);
    }

    pub(crate) fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

impl BlobStore for MemBlobStore {
    fn get(&self, id: &SnapshotId) -> Result<Option<Vec<u8>>, BlobStoreError> {
        Ok(self.0.lock().unwrap().get(id).cloned())
    }

    fn set(&mut self, id: &SnapshotId, bytes: &[u8]) -> Result<(), BlobStoreError> {
        self.0.lock().unwrap().insert(*id, bytes.to_vec());
        Ok(())
    }

    fn list(&self) -> Result<Vec<SnapshotInfo>, BlobStoreError> {
        let mut infos: Vec<SnapshotInfo> = self
            .0
            .lock()
            .unwrap()
            .iter()
            .map(|(id, bytes)| SnapshotInfo {
                id: *id,
                size: bytes.len() as u64,
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        Ok(infos)
    }
}

/// A [`RemoteBlobSource`] that serves the contents of another peer's [`MemBlobStore`].
pub(crate) struct MemRemote(pub(crate) MemBlobStore);

impl RemoteBlobSource for MemRemote {
    fn fetch(&self, id: &SnapshotId) -> Result<Option<Vec<u8>>, BlobStoreError> {
        self.0.get(id)
    }
}
