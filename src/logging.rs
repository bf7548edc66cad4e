/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the space's
//! [configuration](crate::space::Configuration).
//!
//! echo_rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how an [ApplyMutation](crate::events::ApplyMutationEvent) is printed:
//!
//! ```text
//! ApplyMutation, 1701329264, task-1, Id5u7f6, 3, 12
//! ```
//!
//! In the snippet:
//! - The third value is the id of the mutated item.
//! - The fourth value is the first seven characters of the Base64 encoding of the key of the feed
//!   that the mutation was read from.
//! - The fifth value is the sequence number of the mutation's block in that feed.
//! - The sixth value is the number of blocks covered by the space's timeframe after the mutation.

use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const OPEN_SPACE: &str = "OpenSpace";
pub const CLOSE_SPACE: &str = "CloseSpace";

pub const INSERT_ITEM: &str = "InsertItem";
pub const APPLY_MUTATION: &str = "ApplyMutation";
pub const SKIP_MUTATION: &str = "SkipMutation";

pub const BUFFER_MUTATION: &str = "BufferMutation";
pub const REJECT_GENESIS: &str = "RejectGenesis";
pub const FEED_READ_ERROR: &str = "FeedReadError";
pub const STALL: &str = "Stall";

pub const SAVE_SNAPSHOT: &str = "SaveSnapshot";
pub const LOAD_SNAPSHOT: &str = "LoadSnapshot";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for OpenSpaceEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |open_space_event: &OpenSpaceEvent| {
            log::info!(
                "{}, {}, {}, {}",
                OPEN_SPACE,
                secs_since_unix_epoch(open_space_event.timestamp),
                open_space_event.space_key,
                open_space_event.timeframe.total_blocks()
            )
        };
        Box::new(logger)
    }
}

impl Logger for CloseSpaceEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |close_space_event: &CloseSpaceEvent| {
            log::info!(
                "{}, {}, {}, {}",
                CLOSE_SPACE,
                secs_since_unix_epoch(close_space_event.timestamp),
                close_space_event.space_key,
                close_space_event.timeframe.total_blocks()
            )
        };
        Box::new(logger)
    }
}

impl Logger for InsertItemEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |insert_item_event: &InsertItemEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                INSERT_ITEM,
                secs_since_unix_epoch(insert_item_event.timestamp),
                insert_item_event.item_id,
                insert_item_event.item_type,
                insert_item_event.feed_key,
                insert_item_event.seq
            )
        };
        Box::new(logger)
    }
}

impl Logger for ApplyMutationEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |apply_mutation_event: &ApplyMutationEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                APPLY_MUTATION,
                secs_since_unix_epoch(apply_mutation_event.timestamp),
                apply_mutation_event.item_id,
                apply_mutation_event.feed_key,
                apply_mutation_event.seq,
                apply_mutation_event.timeframe.total_blocks()
            )
        };
        Box::new(logger)
    }
}

impl Logger for SkipMutationEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |skip_mutation_event: &SkipMutationEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                SKIP_MUTATION,
                secs_since_unix_epoch(skip_mutation_event.timestamp),
                skip_mutation_event.feed_key,
                skip_mutation_event.seq,
                skip_mutation_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for BufferMutationEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |buffer_mutation_event: &BufferMutationEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                BUFFER_MUTATION,
                secs_since_unix_epoch(buffer_mutation_event.timestamp),
                buffer_mutation_event.feed_key,
                buffer_mutation_event.seq,
                buffer_mutation_event.missing.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectGenesisEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_genesis_event: &RejectGenesisEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                REJECT_GENESIS,
                secs_since_unix_epoch(reject_genesis_event.timestamp),
                reject_genesis_event.feed_key,
                reject_genesis_event.seq,
                reject_genesis_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for FeedReadErrorEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |feed_read_error_event: &FeedReadErrorEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                FEED_READ_ERROR,
                secs_since_unix_epoch(feed_read_error_event.timestamp),
                feed_read_error_event.feed_key,
                feed_read_error_event.seq,
                feed_read_error_event.retry_in.as_millis(),
                feed_read_error_event.error
            )
        };
        Box::new(logger)
    }
}

impl Logger for StallEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |stall_event: &StallEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                STALL,
                secs_since_unix_epoch(stall_event.timestamp),
                stall_event.buffered,
                stall_event.missing.len(),
                stall_event.stalled_for.as_secs()
            )
        };
        Box::new(logger)
    }
}

impl Logger for SaveSnapshotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |save_snapshot_event: &SaveSnapshotEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                SAVE_SNAPSHOT,
                secs_since_unix_epoch(save_snapshot_event.timestamp),
                save_snapshot_event.snapshot,
                save_snapshot_event.timeframe.total_blocks(),
                save_snapshot_event.size
            )
        };
        Box::new(logger)
    }
}

impl Logger for LoadSnapshotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |load_snapshot_event: &LoadSnapshotEvent| {
            log::info!(
                "{}, {}, {}, {}",
                LOAD_SNAPSHOT,
                secs_since_unix_epoch(load_snapshot_event.timestamp),
                load_snapshot_event.snapshot,
                load_snapshot_event.timeframe.total_blocks()
            )
        };
        Box::new(logger)
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}
