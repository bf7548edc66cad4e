/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::sync::Arc;

use crate::{
    pipeline::state::SpaceState,
    types::data_types::{CryptoHash, SpaceKey},
};

use super::{
    pluggables::{BlobStore, RemoteBlobSource},
    types::{Snapshot, SnapshotInfo},
    SnapshotError, SnapshotId,
};

/// Saves and loads [`Snapshot`]s through a local [`BlobStore`], falling back to an optional
/// [`RemoteBlobSource`] for snapshots that are not stored locally.
#[derive(Clone)]
pub struct SnapshotManager<B: BlobStore> {
    store: B,
    remote: Option<Arc<dyn RemoteBlobSource>>,
}

impl<B: BlobStore> SnapshotManager<B> {
    pub fn new(store: B) -> SnapshotManager<B> {
        SnapshotManager {
            store,
            remote: None,
        }
    }

    pub fn with_remote(store: B, remote: Arc<dyn RemoteBlobSource>) -> SnapshotManager<B> {
        SnapshotManager {
            store,
            remote: Some(remote),
        }
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    /// Capture `state` and save it. Saving the same state twice returns the same id and stores the
    /// blob once.
    pub fn save(
        &mut self,
        space_key: SpaceKey,
        state: &SpaceState,
    ) -> Result<SnapshotInfo, SnapshotError> {
        self.save_snapshot(&Snapshot::capture(space_key, state))
    }

    pub fn save_snapshot(&mut self, snapshot: &Snapshot) -> Result<SnapshotInfo, SnapshotError> {
        let bytes = snapshot.encode()?;
        let id = CryptoHash::of(&bytes);
        if !self.store.contains(&id)? {
            self.store.set(&id, &bytes)?;
        }
        Ok(SnapshotInfo {
            id,
            size: bytes.len() as u64,
        })
    }

    /// Load the state saved in snapshot `id`.
    pub fn load(&mut self, id: &SnapshotId) -> Result<SpaceState, SnapshotError> {
        self.load_snapshot(id)?.into_state()
    }

    /// Load snapshot `id` from the local store or, failing that, from the remote source. Snapshots
    /// fetched remotely are cached in the local store once they pass verification.
    pub fn load_snapshot(&mut self, id: &SnapshotId) -> Result<Snapshot, SnapshotError> {
        if let Some(bytes) = self.store.get(id)? {
            verify(id, &bytes)?;
            return Snapshot::decode(&bytes);
        }

        let Some(remote) = &self.remote else {
            return Err(SnapshotError::NotFound(*id));
        };
        let Some(bytes) = remote.fetch(id)? else {
            return Err(SnapshotError::NotFound(*id));
        };
        verify(id, &bytes)?;
        let snapshot = Snapshot::decode(&bytes)?;
        self.store.set(id, &bytes)?;
        log::debug!("Cached remote snapshot {} ({} bytes)", id, bytes.len());
        Ok(snapshot)
    }

    /// The snapshots in the local store.
    pub fn list_available(&self) -> Result<Vec<SnapshotInfo>, SnapshotError> {
        Ok(self.store.list()?)
    }

    /// The locally stored snapshot of `space_key` that covers the most blocks, if any. Blobs that
    /// cannot be loaded are logged and ignored.
    pub fn latest(
        &mut self,
        space_key: &SpaceKey,
    ) -> Result<Option<(SnapshotId, Snapshot)>, SnapshotError> {
        let mut latest: Option<(SnapshotId, Snapshot)> = None;
        for info in self.store.list()? {
            let snapshot = match self.load_snapshot(&info.id) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    log::warn!("Ignoring unreadable snapshot {}: {}", info.id, err);
                    continue;
                }
            };
            if snapshot.space_key != *space_key {
                continue;
            }

            let newer = match &latest {
                Some((latest_id, latest_snapshot)) => {
                    (snapshot.timeframe.total_blocks(), info.id)
                        > (latest_snapshot.timeframe.total_blocks(), *latest_id)
                }
                None => true,
            };
            if newer {
                latest = Some((info.id, snapshot));
            }
        }
        Ok(latest)
    }
}

fn verify(id: &SnapshotId, bytes: &[u8]) -> Result<(), SnapshotError> {
    let actual = CryptoHash::of(bytes);
    if actual != *id {
        return Err(SnapshotError::Corrupted {
            expected: *id,
            actual,
        });
    }
    Ok(())
}
