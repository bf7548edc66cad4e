/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::io;

use super::{messages::FeedBlock, pluggables::FeedStorage};

/// A [`FeedStorage`] that keeps blocks in memory. Its contents are lost when the feed is dropped.
#[derive(Default)]
pub struct MemFeedStorage(Vec<FeedBlock>);

impl MemFeedStorage {
    pub fn new() -> MemFeedStorage {
        MemFeedStorage(Vec::new())
    }
}

impl FeedStorage for MemFeedStorage {
    fn append(&mut self, block: &FeedBlock) -> io::Result<()> {
        self.0.push(block.clone());
        Ok(())
    }

    fn get(&self, seq: u64) -> io::Result<Option<FeedBlock>> {
        Ok(usize::try_from(seq)
            .ok()
            .and_then(|index| self.0.get(index))
            .cloned())
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.0.len() as u64)
    }
}
