/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of echo_rs events for event handling and logging.
//!
//! An event for a given action indicates that the action has been completed. Events are published by
//! a space's threads onto a channel, and dispatched to the handlers registered on the
//! [`SpaceSpec`](crate::space::SpaceSpec) by the [event bus](crate::event_bus) thread.

use std::sync::mpsc::Sender;
use std::time::{Duration, SystemTime};

use crate::{
    pipeline::processor::{RejectReason, SkipReason},
    snapshot::SnapshotId,
    timeframe::Timeframe,
    types::data_types::{FeedKey, ItemId, ItemType, SpaceKey},
};

pub enum Event {
    // Space lifecycle events.
    OpenSpace(OpenSpaceEvent),
    CloseSpace(CloseSpaceEvent),
    // Events that change the space's state.
    InsertItem(InsertItemEvent),
    ApplyMutation(ApplyMutationEvent),
    SkipMutation(SkipMutationEvent),
    // Events that involve blocks that cannot be applied (yet).
    BufferMutation(BufferMutationEvent),
    RejectGenesis(RejectGenesisEvent),
    FeedReadError(FeedReadErrorEvent),
    Stall(StallEvent),
    // Snapshot events.
    SaveSnapshot(SaveSnapshotEvent),
    LoadSnapshot(LoadSnapshotEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            // The event bus only goes away when the space is closing.
            let _ = event_publisher.send(event);
        }
    }
}

pub struct OpenSpaceEvent {
    pub timestamp: SystemTime,
    pub space_key: SpaceKey,
    pub timeframe: Timeframe,
}

pub struct CloseSpaceEvent {
    pub timestamp: SystemTime,
    pub space_key: SpaceKey,
    pub timeframe: Timeframe,
}

pub struct InsertItemEvent {
    pub timestamp: SystemTime,
    pub item_id: ItemId,
    pub item_type: ItemType,
    pub feed_key: FeedKey,
    pub seq: u64,
}

pub struct ApplyMutationEvent {
    pub timestamp: SystemTime,
    pub item_id: ItemId,
    pub feed_key: FeedKey,
    pub seq: u64,
    /// The space's timeframe after the mutation was applied.
    pub timeframe: Timeframe,
}

pub struct SkipMutationEvent {
    pub timestamp: SystemTime,
    pub feed_key: FeedKey,
    pub seq: u64,
    pub reason: SkipReason,
}

/// A block arrived whose dependencies are not yet satisfied.
pub struct BufferMutationEvent {
    pub timestamp: SystemTime,
    pub feed_key: FeedKey,
    pub seq: u64,
    pub missing: Timeframe,
}

pub struct RejectGenesisEvent {
    pub timestamp: SystemTime,
    pub feed_key: FeedKey,
    pub seq: u64,
    pub reason: RejectReason,
}

pub struct FeedReadErrorEvent {
    pub timestamp: SystemTime,
    pub feed_key: FeedKey,
    pub seq: u64,
    pub error: String,
    pub retry_in: Duration,
}

/// Blocks have stayed buffered, without the space's timeframe advancing, for the configured stall
/// timeout.
pub struct StallEvent {
    pub timestamp: SystemTime,
    pub timeframe: Timeframe,
    pub missing: Timeframe,
    pub buffered: usize,
    pub stalled_for: Duration,
}

pub struct SaveSnapshotEvent {
    pub timestamp: SystemTime,
    pub snapshot: SnapshotId,
    pub timeframe: Timeframe,
    pub size: u64,
}

pub struct LoadSnapshotEvent {
    pub timestamp: SystemTime,
    pub snapshot: SnapshotId,
    pub timeframe: Timeframe,
}
