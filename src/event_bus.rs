/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The event bus thread, which dispatches published [events](crate::events) to their handlers.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

#[derive(Default)]
pub(crate) struct EventHandlers {
    pub(crate) open_space_handlers: Vec<HandlerPtr<OpenSpaceEvent>>,
    pub(crate) close_space_handlers: Vec<HandlerPtr<CloseSpaceEvent>>,
    pub(crate) insert_item_handlers: Vec<HandlerPtr<InsertItemEvent>>,
    pub(crate) apply_mutation_handlers: Vec<HandlerPtr<ApplyMutationEvent>>,
    pub(crate) skip_mutation_handlers: Vec<HandlerPtr<SkipMutationEvent>>,
    pub(crate) buffer_mutation_handlers: Vec<HandlerPtr<BufferMutationEvent>>,
    pub(crate) reject_genesis_handlers: Vec<HandlerPtr<RejectGenesisEvent>>,
    pub(crate) feed_read_error_handlers: Vec<HandlerPtr<FeedReadErrorEvent>>,
    pub(crate) stall_handlers: Vec<HandlerPtr<StallEvent>>,
    pub(crate) save_snapshot_handlers: Vec<HandlerPtr<SaveSnapshotEvent>>,
    pub(crate) load_snapshot_handlers: Vec<HandlerPtr<LoadSnapshotEvent>>,
}

/// One user-supplied handler per event type, each optional.
#[derive(Default)]
pub(crate) struct UserHandlers {
    pub(crate) open_space: Option<HandlerPtr<OpenSpaceEvent>>,
    pub(crate) close_space: Option<HandlerPtr<CloseSpaceEvent>>,
    pub(crate) insert_item: Option<HandlerPtr<InsertItemEvent>>,
    pub(crate) apply_mutation: Option<HandlerPtr<ApplyMutationEvent>>,
    pub(crate) skip_mutation: Option<HandlerPtr<SkipMutationEvent>>,
    pub(crate) buffer_mutation: Option<HandlerPtr<BufferMutationEvent>>,
    pub(crate) reject_genesis: Option<HandlerPtr<RejectGenesisEvent>>,
    pub(crate) feed_read_error: Option<HandlerPtr<FeedReadErrorEvent>>,
    pub(crate) stall: Option<HandlerPtr<StallEvent>>,
    pub(crate) save_snapshot: Option<HandlerPtr<SaveSnapshotEvent>>,
    pub(crate) load_snapshot: Option<HandlerPtr<LoadSnapshotEvent>>,
}

impl EventHandlers {
    /// Combine the user's handlers with the default logging handlers, if `log_events` is set.
    pub(crate) fn new(log_events: bool, user: UserHandlers) -> EventHandlers {
        fn handlers<T: Logger>(log_events: bool, user: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
            let mut handlers = Vec::new();
            if log_events {
                handlers.push(T::get_logger());
            }
            handlers.extend(user);
            handlers
        }

        EventHandlers {
            open_space_handlers: handlers(log_events, user.open_space),
            close_space_handlers: handlers(log_events, user.close_space),
            insert_item_handlers: handlers(log_events, user.insert_item),
            apply_mutation_handlers: handlers(log_events, user.apply_mutation),
            skip_mutation_handlers: handlers(log_events, user.skip_mutation),
            buffer_mutation_handlers: handlers(log_events, user.buffer_mutation),
            reject_genesis_handlers: handlers(log_events, user.reject_genesis),
            feed_read_error_handlers: handlers(log_events, user.feed_read_error),
            stall_handlers: handlers(log_events, user.stall),
            save_snapshot_handlers: handlers(log_events, user.save_snapshot),
            load_snapshot_handlers: handlers(log_events, user.load_snapshot),
        }
    }

    /// Whether any handler is registered. If none is, spaces do not start an event bus at all.
    pub(crate) fn is_empty(&self) -> bool {
        self.open_space_handlers.is_empty()
            && self.close_space_handlers.is_empty()
            && self.insert_item_handlers.is_empty()
            && self.apply_mutation_handlers.is_empty()
            && self.skip_mutation_handlers.is_empty()
            && self.buffer_mutation_handlers.is_empty()
            && self.reject_genesis_handlers.is_empty()
            && self.feed_read_error_handlers.is_empty()
            && self.stall_handlers.is_empty()
            && self.save_snapshot_handlers.is_empty()
            && self.load_snapshot_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::OpenSpace(open_space_event) => self
                .open_space_handlers
                .iter()
                .for_each(|handler| handler(&open_space_event)),

            Event::CloseSpace(close_space_event) => self
                .close_space_handlers
                .iter()
                .for_each(|handler| handler(&close_space_event)),

            Event::InsertItem(insert_item_event) => self
                .insert_item_handlers
                .iter()
                .for_each(|handler| handler(&insert_item_event)),

            Event::ApplyMutation(apply_mutation_event) => self
                .apply_mutation_handlers
                .iter()
                .for_each(|handler| handler(&apply_mutation_event)),

            Event::SkipMutation(skip_mutation_event) => self
                .skip_mutation_handlers
                .iter()
                .for_each(|handler| handler(&skip_mutation_event)),

            Event::BufferMutation(buffer_mutation_event) => self
                .buffer_mutation_handlers
                .iter()
                .for_each(|handler| handler(&buffer_mutation_event)),

            Event::RejectGenesis(reject_genesis_event) => self
                .reject_genesis_handlers
                .iter()
                .for_each(|handler| handler(&reject_genesis_event)),

            Event::FeedReadError(feed_read_error_event) => self
                .feed_read_error_handlers
                .iter()
                .for_each(|handler| handler(&feed_read_error_event)),

            Event::Stall(stall_event) => self
                .stall_handlers
                .iter()
                .for_each(|handler| handler(&stall_event)),

            Event::SaveSnapshot(save_snapshot_event) => self
                .save_snapshot_handlers
                .iter()
                .for_each(|handler| handler(&save_snapshot_event)),

            Event::LoadSnapshot(load_snapshot_event) => self
                .load_snapshot_handlers
                .iter()
                .for_each(|handler| handler(&load_snapshot_event)),
        }
    }
}

/// Start the event bus thread. It runs until it receives the shutdown signal, handles every event
/// published before that, and then hands the handlers back so that they can be reused when the space
/// is opened again.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
    poll_interval: Duration,
) -> JoinHandle<EventHandlers> {
    thread::spawn(move || loop {
        let shutting_down = match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => true,
            Err(TryRecvError::Empty) => false,
        };

        if shutting_down {
            while let Ok(event) = event_subscriber.try_recv() {
                event_handlers.fire_handlers(event)
            }
            return event_handlers;
        }

        match event_subscriber.recv_timeout(poll_interval) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return event_handlers,
        }
    })
}
