/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build, open, and close a space.
//!
//! A space is the unit of replication: a set of feeds, one per participating peer, whose mutations
//! are merged into a single item database. This module exposes:
//! - The builder-pattern interface to construct a [specification of the space](SpaceSpec) with:
//!   1. `SpaceSpec::builder` to construct a `SpaceSpecBuilder`,
//!   2. The setters of the `SpaceSpecBuilder`, and
//!   3. The `SpaceSpecBuilder::build` method to construct a [SpaceSpec],
//! - The function to [create](SpaceSpec::create) a closed [Space] from its specification.
//! - The [Space] type, whose [open](Space::open) method starts the space's threads, and which stops
//!   them when it is [closed](Space::close) or dropped.
//!
//! ## Example
//!
//! ```ignore
//! let mut space = SpaceSpec::builder()
//!     .configuration(Configuration::builder().space_key(space_key).build())
//!     .blob_store(FsBlobStore::open("snapshots")?)
//!     .registry(ModelRegistry::new().with(ObjectModel)?)
//!     .feeds(vec![peer_feed])
//!     .writer(my_feed_writer)
//!     .on_insert_item(|event| println!("{} created", event.item_id))
//!     .build()
//!     .create();
//!
//! space.open()?;
//! let receipt = space.writer().unwrap().create_item("task", ObjectModel::MODEL_TYPE, None)?;
//! space.wait_until_timeframe(&receipt.timeframe(), Duration::from_secs(1));
//! ```
//!
//! ## Opening
//!
//! Opening a space restores the locally stored snapshot of the space that covers the most blocks,
//! starts one reader per feed from the block after the snapshot's timeframe, and waits until the
//! initial replay reaches the end of every feed as it was when `open` was called. If that takes
//! longer than the configured open timeout, `open` logs a warning and returns with partially
//! replayed state; replay continues in the background.

use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    io,
    sync::{
        mpsc::{self, Sender},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, SystemTime},
};

use typed_builder::TypedBuilder;

use crate::{
    event_bus::*,
    events::*,
    feed::{Feed, FeedError, FeedWriter},
    item_store::{Item, ItemFilter, ItemQuery, ItemStoreError},
    model::registry::ModelRegistry,
    pipeline::{
        coordinator::{Coordinator, PipelineMessage},
        processor::MutationProcessor,
        reader::{FeedReader, RetryPolicy},
        state::{SharedSpaceState, SpaceCamera, SpaceState, SpaceStatus, WaitOutcome},
        watchers::{ItemSubscription, ItemWatchers},
    },
    snapshot::{BlobStore, RemoteBlobSource, Snapshot, SnapshotError, SnapshotInfo, SnapshotManager},
    timeframe::Timeframe,
    types::data_types::{FeedKey, ItemId, SpaceKey},
};

pub mod config;
pub use config::Configuration;

pub mod writer;
pub use writer::{SpaceWriter, WriteReceipt};

/// Stores all necessary parameters and trait implementations required to create a [Space].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [SpaceSpec]. On the builder call the following methods to construct a valid [SpaceSpec].

    Required:
    - `.configuration(...)`
    - `.blob_store(...)`

    Optional:
    - `.registry(...)`
    - `.feeds(...)`
    - `.writer(...)`
    - `.remote(...)`
    - `.on_open_space(...)`
    - `.on_close_space(...)`
    - `.on_insert_item(...)`
    - `.on_apply_mutation(...)`
    - `.on_skip_mutation(...)`
    - `.on_buffer_mutation(...)`
    - `.on_reject_genesis(...)`
    - `.on_feed_read_error(...)`
    - `.on_stall(...)`
    - `.on_save_snapshot(...)`
    - `.on_load_snapshot(...)`
"))]
pub struct SpaceSpec<B: BlobStore> {
    // Required parameters
    #[builder(setter(doc = "Set the [configuration](Configuration) of the space. Required."))]
    configuration: Configuration,
    #[builder(setter(doc = "Set the local store of snapshot blobs. The argument must implement the [BlobStore](crate::snapshot::BlobStore) trait. Required."))]
    blob_store: B,
    // Optional parameters
    #[builder(default, setter(doc = "Set the models that interpret the space's items. Items of unregistered models keep their raw mutations. Optional."))]
    registry: ModelRegistry,
    #[builder(default, setter(doc = "Set the feeds of the space's peers. Optional."))]
    feeds: Vec<Feed>,
    #[builder(default, setter(strip_option, doc = "Set the writer of the local peer's feed. Without one, the space is read-only. Optional."))]
    writer: Option<FeedWriter>,
    #[builder(default, setter(strip_option, doc = "Set a source to fetch snapshots that are not stored locally from. Optional."))]
    remote: Option<Arc<dyn RemoteBlobSource>>,
    #[builder(default, setter(transform = |handler: impl Fn(&OpenSpaceEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<OpenSpaceEvent>),
    doc = "Register a handler closure to be invoked after the space is opened. Optional."))]
    on_open_space: Option<HandlerPtr<OpenSpaceEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CloseSpaceEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CloseSpaceEvent>),
    doc = "Register a handler closure to be invoked after the space is closed. Optional."))]
    on_close_space: Option<HandlerPtr<CloseSpaceEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&InsertItemEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<InsertItemEvent>),
    doc = "Register a handler closure to be invoked after an item is created. Optional."))]
    on_insert_item: Option<HandlerPtr<InsertItemEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ApplyMutationEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ApplyMutationEvent>),
    doc = "Register a handler closure to be invoked after a mutation is applied to an item. Optional."))]
    on_apply_mutation: Option<HandlerPtr<ApplyMutationEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SkipMutationEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SkipMutationEvent>),
    doc = "Register a handler closure to be invoked after a block is skipped. Optional."))]
    on_skip_mutation: Option<HandlerPtr<SkipMutationEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&BufferMutationEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<BufferMutationEvent>),
    doc = "Register a handler closure to be invoked when a block has to wait for its dependencies. Optional."))]
    on_buffer_mutation: Option<HandlerPtr<BufferMutationEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RejectGenesisEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RejectGenesisEvent>),
    doc = "Register a handler closure to be invoked after a duplicate genesis is rejected. Optional."))]
    on_reject_genesis: Option<HandlerPtr<RejectGenesisEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&FeedReadErrorEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<FeedReadErrorEvent>),
    doc = "Register a handler closure to be invoked after a feed read fails. Optional."))]
    on_feed_read_error: Option<HandlerPtr<FeedReadErrorEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StallEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StallEvent>),
    doc = "Register a handler closure to be invoked when the space stops making progress. Optional."))]
    on_stall: Option<HandlerPtr<StallEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SaveSnapshotEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SaveSnapshotEvent>),
    doc = "Register a handler closure to be invoked after a snapshot is saved. Optional."))]
    on_save_snapshot: Option<HandlerPtr<SaveSnapshotEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&LoadSnapshotEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<LoadSnapshotEvent>),
    doc = "Register a handler closure to be invoked after a snapshot is restored. Optional."))]
    on_load_snapshot: Option<HandlerPtr<LoadSnapshotEvent>>,
}

impl<B: BlobStore> SpaceSpec<B> {
    /// Create the space described by this specification. The space starts [closed](SpaceStatus::Closed).
    pub fn create(self) -> Space<B> {
        let event_handlers = EventHandlers::new(
            self.configuration.log_events,
            UserHandlers {
                open_space: self.on_open_space,
                close_space: self.on_close_space,
                insert_item: self.on_insert_item,
                apply_mutation: self.on_apply_mutation,
                skip_mutation: self.on_skip_mutation,
                buffer_mutation: self.on_buffer_mutation,
                reject_genesis: self.on_reject_genesis,
                feed_read_error: self.on_feed_read_error,
                stall: self.on_stall,
                save_snapshot: self.on_save_snapshot,
                load_snapshot: self.on_load_snapshot,
            },
        );

        let snapshots = match self.remote {
            Some(remote) => SnapshotManager::with_remote(self.blob_store, remote),
            None => SnapshotManager::new(self.blob_store),
        };

        let shared = Arc::new(SharedSpaceState::new(SpaceState::new()));

        let mut feeds: BTreeMap<FeedKey, Feed> = self
            .feeds
            .into_iter()
            .map(|feed| (feed.key(), feed))
            .collect();
        let writer = self.writer.map(|writer| {
            feeds
                .entry(writer.feed_key())
                .or_insert_with(|| writer.feed().clone());
            SpaceWriter::new(writer, shared.clone())
        });

        Space {
            configuration: self.configuration,
            registry: self.registry,
            snapshots,
            shared,
            watchers: Arc::new(ItemWatchers::default()),
            feeds,
            writer,
            status: SpaceStatus::Closed,
            event_handlers: Some(event_handlers),
            pipeline: None,
        }
    }
}

/// A handle to a space. While the space is open, its threads replay the mutations of all of its feeds
/// into its state. When this value is dropped, the space is closed and all its threads are gracefully
/// shut down.
pub struct Space<B: BlobStore> {
    configuration: Configuration,
    registry: ModelRegistry,
    snapshots: SnapshotManager<B>,
    shared: Arc<SharedSpaceState>,
    watchers: Arc<ItemWatchers>,
    feeds: BTreeMap<FeedKey, Feed>,
    writer: Option<SpaceWriter>,
    status: SpaceStatus,
    /// Held here while the space is closed, and by the event bus thread while it is open.
    event_handlers: Option<EventHandlers>,
    pipeline: Option<Pipeline>,
}

/// The threads of an open space.
struct Pipeline {
    inbox: Sender<PipelineMessage>,
    coordinator: Option<JoinHandle<()>>,
    coordinator_shutdown: Sender<()>,
    readers: BTreeMap<FeedKey, FeedReader>,
    event_publisher: Option<Sender<Event>>,
    event_bus: Option<JoinHandle<EventHandlers>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<B: BlobStore> Space<B> {
    /// Restore the space's latest snapshot, start replaying its feeds, and wait for the initial replay
    /// to complete. The wait ends early if the pipeline stalls, and gives up after the open timeout.
    /// Feeds halted at a rejected block are not waited for. Opening an open space does nothing.
    ///
    /// # Errors
    ///
    /// [`SpaceError::SnapshotUnavailable`] if the latest snapshot cannot be loaded and the space has no
    /// feed to replay from instead. The space stays closed.
    pub fn open(&mut self) -> Result<(), SpaceError> {
        if self.status != SpaceStatus::Closed {
            return Ok(());
        }
        self.status = SpaceStatus::Opening;
        let space_key = self.configuration.space_key;

        let restored = match self.snapshots.latest(&space_key) {
            Ok(Some((id, snapshot))) => {
                let timeframe = snapshot.timeframe.clone();
                snapshot.into_state().map(|state| Some((id, timeframe, state)))
            }
            Ok(None) => Ok(None),
            Err(err) => Err(err),
        };
        let restored = match restored {
            Ok(restored) => restored,
            Err(err) if self.feeds.is_empty() => {
                log::error!("Cannot open space {}: {}", space_key, err);
                self.status = SpaceStatus::Closed;
                return Err(SpaceError::SnapshotUnavailable(err));
            }
            Err(err) => {
                log::warn!(
                    "Failed to load the latest snapshot of space {}, replaying from the start: {}",
                    space_key,
                    err
                );
                None
            }
        };

        let (event_publisher, event_bus, event_bus_shutdown) = self.spawn_event_bus();

        if let Some((id, timeframe, state)) = restored {
            // After a close, the in-memory state may already be ahead of the snapshot.
            if timeframe.total_blocks() > self.shared.read().timeframe().total_blocks() {
                self.shared.replace(state);
                Event::publish(
                    &event_publisher,
                    Event::LoadSnapshot(LoadSnapshotEvent {
                        timestamp: SystemTime::now(),
                        snapshot: id,
                        timeframe,
                    }),
                );
            }
        }

        self.shared.clear_halted();
        let (inbox, inbox_receiver) = mpsc::channel();
        let (coordinator_shutdown, coordinator_shutdown_receiver) = mpsc::channel();
        let coordinator = Coordinator::new(
            space_key,
            self.shared.clone(),
            MutationProcessor::new(self.registry.clone()),
            self.watchers.clone(),
            self.snapshots.clone(),
            self.configuration.snapshot_interval,
            self.configuration.poll_interval,
            self.configuration.stall_timeout,
            inbox_receiver,
            event_publisher.clone(),
            coordinator_shutdown_receiver,
        )
        .start();

        let mut pipeline = Pipeline {
            inbox,
            coordinator: Some(coordinator),
            coordinator_shutdown,
            readers: BTreeMap::new(),
            event_publisher,
            event_bus,
            event_bus_shutdown,
        };
        let timeframe = self.shared.read().timeframe().clone();
        for feed in self.feeds.values() {
            let reader = self.start_reader(feed, &timeframe, &pipeline);
            pipeline.readers.insert(feed.key(), reader);
        }
        self.pipeline = Some(pipeline);

        let target = self.end_timeframe();
        let outcome = self
            .shared
            .wait_for_replay(&target, self.configuration.open_timeout);
        if outcome != WaitOutcome::Reached {
            let missing = Timeframe::dependencies(&target, self.shared.read().timeframe());
            log::warn!(
                "Space {} opened before the initial replay completed ({:?}); still missing {}",
                space_key,
                outcome,
                missing
            );
        }

        self.status = SpaceStatus::Open;
        self.publish(Event::OpenSpace(OpenSpaceEvent {
            timestamp: SystemTime::now(),
            space_key,
            timeframe: self.timeframe(),
        }));
        Ok(())
    }

    /// Stop replaying the space's feeds. The state keeps every block applied so far. Closing a closed
    /// space does nothing.
    pub fn close(&mut self) {
        let Some(mut pipeline) = self.pipeline.take() else {
            return;
        };
        self.status = SpaceStatus::Closing;

        // Readers first, so that the coordinator's inbox only loses senders it no longer needs.
        for reader in pipeline.readers.values_mut() {
            reader.stop();
        }
        let _ = pipeline.coordinator_shutdown.send(());
        if let Some(coordinator) = pipeline.coordinator.take() {
            if coordinator.join().is_err() {
                log::error!("Coordinator thread of space {} panicked", self.configuration.space_key);
            }
        }

        Event::publish(
            &pipeline.event_publisher,
            Event::CloseSpace(CloseSpaceEvent {
                timestamp: SystemTime::now(),
                space_key: self.configuration.space_key,
                timeframe: self.timeframe(),
            }),
        );
        if let Some(shutdown) = &pipeline.event_bus_shutdown {
            let _ = shutdown.send(());
        }
        if let Some(event_bus) = pipeline.event_bus.take() {
            match event_bus.join() {
                Ok(event_handlers) => self.event_handlers = Some(event_handlers),
                Err(_) => log::error!(
                    "Event bus thread of space {} panicked",
                    self.configuration.space_key
                ),
            }
        }

        self.watchers.clear();
        self.status = SpaceStatus::Closed;
    }

    /// Stop applying blocks until [`unpause`](Self::unpause) is called. Returns once no block is being
    /// applied. Blocks keep being read and buffered while the space is paused.
    pub fn pause(&self) -> Result<(), SpaceError> {
        let pipeline = self.pipeline.as_ref().ok_or(SpaceError::NotOpen)?;
        let (ack, acked) = mpsc::channel();
        pipeline
            .inbox
            .send(PipelineMessage::Pause(ack))
            .map_err(|_| SpaceError::NotOpen)?;
        acked.recv().map_err(|_| SpaceError::NotOpen)
    }

    pub fn unpause(&self) -> Result<(), SpaceError> {
        let pipeline = self.pipeline.as_ref().ok_or(SpaceError::NotOpen)?;
        pipeline
            .inbox
            .send(PipelineMessage::Unpause)
            .map_err(|_| SpaceError::NotOpen)
    }

    /// Add a feed to the space. If the space is open, the feed is replayed right away.
    pub fn add_feed(&mut self, feed: Feed) -> Result<(), SpaceError> {
        if self.feeds.contains_key(&feed.key()) {
            return Err(SpaceError::DuplicateFeed(feed.key()));
        }
        if let Some(pipeline) = &self.pipeline {
            let timeframe = self.shared.read().timeframe().clone();
            let reader = self.start_reader(&feed, &timeframe, pipeline);
            if let Some(pipeline) = self.pipeline.as_mut() {
                pipeline.readers.insert(feed.key(), reader);
            }
        }
        self.feeds.insert(feed.key(), feed);
        Ok(())
    }

    pub fn space_key(&self) -> SpaceKey {
        self.configuration.space_key
    }

    pub fn status(&self) -> SpaceStatus {
        self.status
    }

    pub fn feed_keys(&self) -> Vec<FeedKey> {
        self.feeds.keys().copied().collect()
    }

    /// The writer of the local peer's feed, if the space was given one.
    pub fn writer(&self) -> Option<&SpaceWriter> {
        self.writer.as_ref()
    }

    pub fn get(&self, item_id: &ItemId) -> Result<Item, ItemStoreError> {
        self.shared.read().items().get(item_id).cloned()
    }

    /// Capture the items that satisfy `predicate`.
    pub fn query(&self, predicate: impl Fn(&Item) -> bool) -> ItemQuery {
        self.shared.read().items().query(predicate)
    }

    /// Capture the items that match `filter`.
    pub fn filter(&self, filter: &ItemFilter) -> ItemQuery {
        self.shared.read().items().filter(filter)
    }

    /// The timeframe of the blocks applied so far.
    pub fn timeframe(&self) -> Timeframe {
        self.shared.read().timeframe().clone()
    }

    /// The timeframe that would be reached by applying every block currently in the space's feeds.
    pub fn end_timeframe(&self) -> Timeframe {
        self.feeds
            .values()
            .filter_map(|feed| feed.length().checked_sub(1).map(|last| (feed.key(), last)))
            .collect()
    }

    /// Block until every block in `target` has been applied, or until `timeout` elapses. Returns whether
    /// `target` was reached.
    pub fn wait_until_timeframe(&self, target: &Timeframe, timeout: Duration) -> bool {
        self.shared.wait_until(target, timeout)
    }

    /// Subscribe to the successive values of `item_id`.
    pub fn on_item_changed(&self, item_id: ItemId) -> ItemSubscription {
        self.watchers.watch(item_id)
    }

    /// Get a camera for consistent, multi-step reads of the space's state.
    pub fn camera(&self) -> SpaceCamera {
        SpaceCamera {
            shared: self.shared.clone(),
        }
    }

    /// Save a snapshot of the space's current state.
    pub fn create_snapshot(&mut self) -> Result<SnapshotInfo, SpaceError> {
        let snapshot = Snapshot::capture(self.configuration.space_key, &self.shared.read());
        let info = self.snapshots.save_snapshot(&snapshot)?;
        self.publish(Event::SaveSnapshot(SaveSnapshotEvent {
            timestamp: SystemTime::now(),
            snapshot: info.id,
            timeframe: snapshot.timeframe,
            size: info.size,
        }));
        Ok(info)
    }

    /// The snapshots in the local blob store.
    pub fn snapshots(&self) -> Result<Vec<SnapshotInfo>, SpaceError> {
        Ok(self.snapshots.list_available()?)
    }

    fn start_reader(&self, feed: &Feed, timeframe: &Timeframe, pipeline: &Pipeline) -> FeedReader {
        FeedReader::start(
            feed,
            timeframe.get(&feed.key()).map_or(0, |seq| seq + 1),
            pipeline.inbox.clone(),
            RetryPolicy {
                base_delay: self.configuration.read_retry_base_delay,
                max_delay: self.configuration.read_retry_max_delay,
            },
            self.configuration.poll_interval,
            pipeline.event_publisher.clone(),
        )
    }

    #[allow(clippy::type_complexity)]
    fn spawn_event_bus(
        &mut self,
    ) -> (
        Option<Sender<Event>>,
        Option<JoinHandle<EventHandlers>>,
        Option<Sender<()>>,
    ) {
        let event_handlers = match self.event_handlers.take() {
            Some(event_handlers) if !event_handlers.is_empty() => event_handlers,
            other => {
                self.event_handlers = other;
                return (None, None, None);
            }
        };

        let (event_publisher, event_subscriber) = mpsc::channel();
        let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
        let event_bus = start_event_bus(
            event_handlers,
            event_subscriber,
            event_bus_shutdown_receiver,
            self.configuration.poll_interval,
        );
        (
            Some(event_publisher),
            Some(event_bus),
            Some(event_bus_shutdown),
        )
    }

    fn publish(&self, event: Event) {
        if let Some(pipeline) = &self.pipeline {
            Event::publish(&pipeline.event_publisher, event);
        }
    }
}

impl<B: BlobStore> Drop for Space<B> {
    fn drop(&mut self) {
        self.close()
    }
}

#[derive(Debug)]
pub enum SpaceError {
    /// The operation needs an open space.
    NotOpen,
    /// The latest snapshot could not be loaded, and the space has no feed to replay from instead.
    SnapshotUnavailable(SnapshotError),
    Snapshot(SnapshotError),
    DuplicateFeed(FeedKey),
    Feed(FeedError),
    Encode(io::Error),
}

impl Display for SpaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SpaceError::NotOpen => f.write_str("space is not open"),
            SpaceError::SnapshotUnavailable(err) => {
                write!(f, "no snapshot or feed to open the space from: {}", err)
            }
            SpaceError::Snapshot(err) => write!(f, "{}", err),
            SpaceError::DuplicateFeed(feed_key) => {
                write!(f, "feed {} is already part of the space", feed_key)
            }
            SpaceError::Feed(err) => write!(f, "{}", err),
            SpaceError::Encode(err) => write!(f, "failed to encode envelope: {}", err),
        }
    }
}

impl std::error::Error for SpaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpaceError::SnapshotUnavailable(err) | SpaceError::Snapshot(err) => Some(err),
            SpaceError::Feed(err) => Some(err),
            SpaceError::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SnapshotError> for SpaceError {
    fn from(err: SnapshotError) -> Self {
        SpaceError::Snapshot(err)
    }
}

impl From<FeedError> for SpaceError {
    fn from(err: FeedError) -> Self {
        SpaceError::Feed(err)
    }
}
