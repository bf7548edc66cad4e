/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The coordinator thread: the only writer of a space's state.
//!
//! The coordinator receives the blocks of every feed from the [readers](super::reader), buffers them
//! in a [`MutationProcessor`], and applies ready blocks one at a time, each under its own hold of the
//! state's write lock. After every applied block it wakes threads waiting for the timeframe to
//! advance, notifies item watchers, and publishes events.
//!
//! Besides applying blocks, the coordinator:
//! 1. Acknowledges [pause](PipelineMessage::Pause) requests between blocks, and applies nothing until
//!    it is unpaused.
//! 2. Reports a stall once blocks have stayed buffered without any progress for the stall timeout, and
//!    wakes threads waiting for the initial replay, which cannot complete while the pipeline is stalled.
//! 3. Saves a snapshot after every `snapshot_interval` consumed blocks, if configured to.

use std::{
    sync::{
        mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant, SystemTime},
};

use crate::{
    events::*,
    feed::FeedBlock,
    snapshot::{BlobStore, Snapshot, SnapshotManager},
    types::data_types::{FeedKey, SpaceKey},
};

use super::{
    processor::{BlockOutcome, MutationProcessor, ProcessedBlock},
    state::SharedSpaceState,
    watchers::ItemWatchers,
};

pub(crate) enum PipelineMessage {
    Block(FeedBlock),
    /// Stop applying blocks. The sender is acknowledged once no block is being applied.
    Pause(Sender<()>),
    Unpause,
}

pub(crate) struct Coordinator<B: BlobStore> {
    space_key: SpaceKey,
    shared: Arc<SharedSpaceState>,
    processor: MutationProcessor,
    watchers: Arc<ItemWatchers>,
    snapshots: SnapshotManager<B>,
    snapshot_interval: Option<u64>,
    poll_interval: Duration,
    stall_timeout: Duration,
    inbox: Receiver<PipelineMessage>,
    event_publisher: Option<Sender<Event>>,
    shutdown_signal: Receiver<()>,

    paused: bool,
    consumed_since_snapshot: u64,
    last_progress: Instant,
    stall_reported: bool,
}

impl<B: BlobStore> Coordinator<B> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        space_key: SpaceKey,
        shared: Arc<SharedSpaceState>,
        processor: MutationProcessor,
        watchers: Arc<ItemWatchers>,
        snapshots: SnapshotManager<B>,
        snapshot_interval: Option<u64>,
        poll_interval: Duration,
        stall_timeout: Duration,
        inbox: Receiver<PipelineMessage>,
        event_publisher: Option<Sender<Event>>,
        shutdown_signal: Receiver<()>,
    ) -> Coordinator<B> {
        Coordinator {
            space_key,
            shared,
            processor,
            watchers,
            snapshots,
            snapshot_interval,
            poll_interval,
            stall_timeout,
            inbox,
            event_publisher,
            shutdown_signal,
            paused: false,
            consumed_since_snapshot: 0,
            last_progress: Instant::now(),
            stall_reported: false,
        }
    }

    pub(crate) fn start(mut self) -> JoinHandle<()> {
        thread::spawn(move || self.execute())
    }

    fn execute(&mut self) {
        loop {
            match self.shutdown_signal.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => return,
                Err(TryRecvError::Empty) => (),
            }

            let mut received = Vec::new();
            match self.inbox.recv_timeout(self.poll_interval) {
                Ok(message) => self.handle(message, &mut received),
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => return,
            }
            while let Ok(message) = self.inbox.try_recv() {
                self.handle(message, &mut received);
            }

            if !self.paused {
                self.apply_ready();
            }
            self.report_buffered(&received);
            self.check_stall();
        }
    }

    fn handle(&mut self, message: PipelineMessage, received: &mut Vec<(FeedKey, u64)>) {
        match message {
            PipelineMessage::Block(block) => {
                let (feed_key, seq) = (block.feed_key, block.seq);
                let enqueued = self.processor.enqueue(block, self.shared.read().timeframe());
                if enqueued {
                    received.push((feed_key, seq));
                }
            }
            PipelineMessage::Pause(ack) => {
                self.paused = true;
                let _ = ack.send(());
            }
            PipelineMessage::Unpause => {
                self.paused = false;
                self.last_progress = Instant::now();
            }
        }
    }

    /// Apply ready blocks, one write lock hold per block, until no block is ready.
    fn apply_ready(&mut self) {
        loop {
            let processed = {
                let mut state = self.shared.write();
                self.processor.process_next(&mut state)
            };
            let Some(processed) = processed else {
                return;
            };

            self.shared.notify_progress();
            self.last_progress = Instant::now();
            self.stall_reported = false;
            self.on_processed(processed);
            self.save_snapshot_if_due();
        }
    }

    fn on_processed(&mut self, processed: ProcessedBlock) {
        let ProcessedBlock {
            feed_key,
            seq,
            outcome,
            timeframe,
            ..
        } = processed;

        match outcome {
            BlockOutcome::Applied { item, genesis } => {
                self.consumed_since_snapshot += 1;
                if genesis {
                    Event::publish(
                        &self.event_publisher,
                        Event::InsertItem(InsertItemEvent {
                            timestamp: SystemTime::now(),
                            item_id: item.id().clone(),
                            item_type: item.item_type().clone(),
                            feed_key,
                            seq,
                        }),
                    );
                } else {
                    Event::publish(
                        &self.event_publisher,
                        Event::ApplyMutation(ApplyMutationEvent {
                            timestamp: SystemTime::now(),
                            item_id: item.id().clone(),
                            feed_key,
                            seq,
                            timeframe,
                        }),
                    );
                }
                self.watchers.notify(&item);
            }
            BlockOutcome::Skipped(reason) => {
                self.consumed_since_snapshot += 1;
                log::warn!("Skipped block {} of feed {}: {}", seq, feed_key, reason);
                Event::publish(
                    &self.event_publisher,
                    Event::SkipMutation(SkipMutationEvent {
                        timestamp: SystemTime::now(),
                        feed_key,
                        seq,
                        reason,
                    }),
                );
            }
            BlockOutcome::Rejected(reason) => {
                self.shared.notify_halted(feed_key);
                log::error!(
                    "Rejected block {} of feed {}: {}. No further blocks of this feed will be applied",
                    seq,
                    feed_key,
                    reason
                );
                Event::publish(
                    &self.event_publisher,
                    Event::RejectGenesis(RejectGenesisEvent {
                        timestamp: SystemTime::now(),
                        feed_key,
                        seq,
                        reason,
                    }),
                );
            }
        }
    }

    fn save_snapshot_if_due(&mut self) {
        let Some(interval) = self.snapshot_interval else {
            return;
        };
        if interval == 0 || self.consumed_since_snapshot < interval {
            return;
        }

        let snapshot = Snapshot::capture(self.space_key, &self.shared.read());
        match self.snapshots.save_snapshot(&snapshot) {
            Ok(info) => {
                self.consumed_since_snapshot = 0;
                Event::publish(
                    &self.event_publisher,
                    Event::SaveSnapshot(SaveSnapshotEvent {
                        timestamp: SystemTime::now(),
                        snapshot: info.id,
                        timeframe: snapshot.timeframe,
                        size: info.size,
                    }),
                );
            }
            Err(err) => log::error!("Failed to save snapshot of space {}: {}", self.space_key, err),
        }
    }

    /// Publish a buffer event for every block received in this iteration that could not be applied.
    fn report_buffered(&self, received: &[(FeedKey, u64)]) {
        if self.event_publisher.is_none() {
            return;
        }
        let state = self.shared.read();
        for (feed_key, seq) in received {
            if let Some(missing) = self.processor.pending(feed_key, *seq, state.timeframe()) {
                Event::publish(
                    &self.event_publisher,
                    Event::BufferMutation(BufferMutationEvent {
                        timestamp: SystemTime::now(),
                        feed_key: *feed_key,
                        seq: *seq,
                        missing,
                    }),
                );
            }
        }
    }

    fn check_stall(&mut self) {
        let buffered = self.processor.buffered();
        if buffered == 0 || self.paused {
            self.last_progress = Instant::now();
            self.stall_reported = false;
            return;
        }

        let stalled_for = self.last_progress.elapsed();
        if self.stall_reported || stalled_for < self.stall_timeout {
            return;
        }

        let (timeframe, missing) = {
            let state = self.shared.read();
            (
                state.timeframe().clone(),
                self.processor.missing(state.timeframe()),
            )
        };
        log::warn!(
            "Space {} stalled: {} blocks buffered for {:?}, waiting for {}",
            self.space_key,
            buffered,
            stalled_for,
            missing
        );
        Event::publish(
            &self.event_publisher,
            Event::Stall(StallEvent {
                timestamp: SystemTime::now(),
                timeframe,
                missing,
                buffered,
                stalled_for,
            }),
        );
        self.stall_reported = true;
        self.shared.notify_stall();
    }
}
