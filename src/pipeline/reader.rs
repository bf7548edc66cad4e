/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Feed reader threads, one per feed of an open space, which forward the feed's blocks in order to the
//! [coordinator](super::coordinator).

use std::{
    sync::mpsc::{self, RecvTimeoutError, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::{Duration, SystemTime},
};

use crate::{
    events::{Event, FeedReadErrorEvent},
    feed::{subscription::SubscriptionHandle, Feed},
    types::data_types::FeedKey,
};

use super::coordinator::PipelineMessage;

/// How long a reader waits before retrying a failed read. The delay doubles after every consecutive
/// failure, up to `max_delay`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RetryPolicy {
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Duration,
}

pub(crate) struct FeedReader {
    feed_key: FeedKey,
    shutdown: Sender<()>,
    subscription: SubscriptionHandle,
    thread: Option<JoinHandle<()>>,
}

impl FeedReader {
    /// Start reading `feed` from block `from_seq`.
    pub(crate) fn start(
        feed: &Feed,
        from_seq: u64,
        inbox: Sender<PipelineMessage>,
        retry: RetryPolicy,
        poll_interval: Duration,
        event_publisher: Option<Sender<Event>>,
    ) -> FeedReader {
        let feed_key = feed.key();
        let mut subscription = feed.subscribe(from_seq);
        let subscription_handle = subscription.handle();
        let (shutdown, shutdown_signal) = mpsc::channel();

        let thread = thread::spawn(move || {
            let mut delay = retry.base_delay;
            loop {
                match shutdown_signal.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => return,
                    Err(TryRecvError::Empty) => (),
                }

                match subscription.next_timeout(poll_interval) {
                    Ok(Some(block)) => {
                        delay = retry.base_delay;
                        if inbox.send(PipelineMessage::Block(block)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {
                        if subscription.is_closed() {
                            return;
                        }
                    }
                    Err(err) => {
                        log::warn!(
                            "Failed to read block {} of feed {}: {}. Retrying in {:?}",
                            subscription.cursor(),
                            feed_key,
                            err,
                            delay
                        );
                        Event::publish(
                            &event_publisher,
                            Event::FeedReadError(FeedReadErrorEvent {
                                timestamp: SystemTime::now(),
                                feed_key,
                                seq: subscription.cursor(),
                                error: err.to_string(),
                                retry_in: delay,
                            }),
                        );

                        match shutdown_signal.recv_timeout(delay) {
                            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                            Err(RecvTimeoutError::Timeout) => (),
                        }
                        delay = delay.saturating_mul(2).min(retry.max_delay);
                    }
                }
            }
        });

        FeedReader {
            feed_key,
            shutdown,
            subscription: subscription_handle,
            thread: Some(thread),
        }
    }

    /// Stop the reader thread and wait for it to exit.
    pub(crate) fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.shutdown.send(());
            self.subscription.close();
            if thread.join().is_err() {
                log::error!("Reader thread of feed {} panicked", self.feed_key);
            }
        }
    }
}

impl Drop for FeedReader {
    fn drop(&mut self) {
        self.stop()
    }
}
