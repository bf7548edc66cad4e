//! A [`FeedStorage`] that fails a configurable number of reads before recovering.

use std::{
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use echo_rs::feed::{FeedBlock, FeedStorage, MemFeedStorage};

pub(crate) struct FlakyFeedStorage {
    inner: MemFeedStorage,
    failures_left: Arc<AtomicUsize>,
}

impl FlakyFeedStorage {
    /// Create an empty storage, and the counter of reads that will still fail. The counter can be
    /// raised at any time to inject more failures.
    pub(crate) fn new() -> (FlakyFeedStorage, Arc<AtomicUsize>) {
        let failures_left = Arc::new(AtomicUsize::new(0));
        (
            FlakyFeedStorage {
                inner: MemFeedStorage::new(),
                failures_left: failures_left.clone(),
            },
            failures_left,
        )
    }
}

impl FeedStorage for FlakyFeedStorage {
    fn append(&mut self, block: &FeedBlock) -> io::Result<()> {
        self.inner.append(block)
    }

    fn get(&self, seq: u64) -> io::Result<Option<FeedBlock>> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
        }
        self.inner.get(seq)
    }

    fn len(&self) -> io::Result<u64> {
        self.inner.len()
    }
}
