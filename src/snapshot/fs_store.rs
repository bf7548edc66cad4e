/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::types::data_types::CryptoHash;

use super::{
    pluggables::{BlobStore, BlobStoreError},
    types::SnapshotInfo,
    SnapshotId,
};

/// A [`BlobStore`] backed by a directory. Each blob is a file named by the URL-safe base64 encoding of
/// its id.
#[derive(Clone)]
pub struct FsBlobStore {
    dir: Arc<PathBuf>,
}

impl FsBlobStore {
    /// Open the store in `dir`, creating the directory if it does not exist.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<FsBlobStore> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(FsBlobStore {
            dir: Arc::new(dir.as_ref().to_path_buf()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: &SnapshotId) -> PathBuf {
        self.dir.join(id.to_base64())
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, id: &SnapshotId) -> Result<Option<Vec<u8>>, BlobStoreError> {
        match fs::read(self.path(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, id: &SnapshotId, bytes: &[u8]) -> Result<(), BlobStoreError> {
        // Write then rename, so that a blob is either absent or complete.
        let tmp = self.dir.join(format!(".{}.tmp", id.to_base64()));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, self.path(id))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<SnapshotInfo>, BlobStoreError> {
        let mut infos = Vec::new();
        for entry in fs::read_dir(self.dir.as_path())? {
            let entry = entry?;
            let Some(id) = entry.file_name().to_str().and_then(CryptoHash::from_base64) else {
                continue;
            };
            infos.push(SnapshotInfo {
                id,
                size: entry.metadata()?.len(),
            });
        }
        infos.sort_by_key(|info| info.id);
        Ok(infos)
    }

    fn contains(&self, id: &SnapshotId) -> Result<bool, BlobStoreError> {
        Ok(self.path(id).is_file())
    }
}
