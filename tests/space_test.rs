use std::{
    sync::{
        atomic::Ordering,
        mpsc::{self, Receiver},
    },
    time::{Duration, Instant},
};

use log::LevelFilter;

use echo_rs::{
    feed::{EnvelopePayload, Feed, FeedWriter},
    item_store::ItemFilter,
    model::object_model::ObjectModel,
    pipeline::state::SpaceStatus,
    snapshot::{BlobStore, BlobStoreError, SnapshotId, SnapshotInfo},
    space::{Configuration, Space, SpaceError, SpaceSpec},
    timeframe::Timeframe,
    types::{
        data_types::{FeedKey, ItemId, SpaceKey},
        value::Value,
    },
};

mod common;

use common::{
    flaky_storage::FlakyFeedStorage,
    logging::{log_with_context, setup_logger},
    mem_blob_store::MemBlobStore,
    peer::{object_registry, replicate, set, Peer, TASK},
};

const SPACE: SpaceKey = SpaceKey::new([7u8; 32]);
const WAIT: Duration = Duration::from_secs(5);

fn configuration() -> Configuration {
    Configuration::builder()
        .space_key(SPACE)
        .open_timeout(WAIT)
        .poll_interval(Duration::from_millis(10))
        .read_retry_base_delay(Duration::from_millis(10))
        .read_retry_max_delay(Duration::from_millis(40))
        .stall_timeout(Duration::from_millis(200))
        .log_events(true)
        .build()
}

/// A space whose local peer writes `writer`, and which also replays `feeds`.
fn space(writer: FeedWriter, feeds: Vec<Feed>, store: MemBlobStore) -> Space<MemBlobStore> {
    SpaceSpec::builder()
        .configuration(configuration())
        .blob_store(store)
        .registry(object_registry())
        .feeds(feeds)
        .writer(writer)
        .build()
        .create()
}

/// A space with no local writer.
fn reader_space(feeds: Vec<Feed>, store: MemBlobStore) -> Space<MemBlobStore> {
    SpaceSpec::builder()
        .configuration(configuration())
        .blob_store(store)
        .registry(object_registry())
        .feeds(feeds)
        .build()
        .create()
}

fn title(space: &Space<MemBlobStore>, item_id: &ItemId) -> Option<Value> {
    let item = space.get(item_id).ok()?;
    ObjectModel::view(item.model_state())
        .unwrap()
        .get("title")
        .cloned()
}

fn drain<T>(receiver: &Receiver<T>) -> Vec<T> {
    receiver.try_iter().collect()
}

#[test]
fn open_and_close_are_idempotent() {
    setup_logger(LevelFilter::Info);
    let Peer { writer, .. } = Peer::new();
    let mut space = space(writer, Vec::new(), MemBlobStore::new());
    assert_eq!(space.status(), SpaceStatus::Closed);

    // 1. Open twice.
    space.open().unwrap();
    space.open().unwrap();
    assert_eq!(space.status(), SpaceStatus::Open);

    // 2. Close twice.
    space.close();
    space.close();
    assert_eq!(space.status(), SpaceStatus::Closed);
    assert!(matches!(space.pause(), Err(SpaceError::NotOpen)));

    // 3. A closed space can be reopened.
    space.open().unwrap();
    assert_eq!(space.status(), SpaceStatus::Open);
}

#[test]
fn written_items_are_applied_locally() {
    setup_logger(LevelFilter::Info);
    let Peer { writer, .. } = Peer::new();
    let mut space = space(writer, Vec::new(), MemBlobStore::new());
    space.open().unwrap();

    // 1. Create an item with an initial title, then change it.
    let writer = space.writer().unwrap();
    let created = writer
        .create_item(TASK, ObjectModel::MODEL_TYPE, Some(set("title", "draft")))
        .unwrap();
    let changed = writer
        .mutate(created.item_id.clone(), set("title", "final"))
        .unwrap();
    assert_eq!(changed.seq, created.seq + 1);

    // 2. Wait until the second write is applied.
    assert!(space.wait_until_timeframe(&changed.timeframe(), WAIT));
    assert_eq!(title(&space, &created.item_id), Some(Value::from("final")));
    assert_eq!(space.timeframe(), changed.timeframe());
    assert_eq!(space.end_timeframe(), changed.timeframe());

    // 3. Children are found through their parent.
    let child = space
        .writer()
        .unwrap()
        .create_child_item(created.item_id.clone(), TASK, ObjectModel::MODEL_TYPE, None)
        .unwrap();
    assert!(space.wait_until_timeframe(&child.timeframe(), WAIT));
    let children = space.filter(&ItemFilter::new().with_parent(created.item_id.clone()));
    assert_eq!(children.ids(), vec![child.item_id.clone()]);
    assert_eq!(space.query(|_| true).len(), 2);
}

#[test]
fn two_peers_converge() {
    setup_logger(LevelFilter::Info);
    let (alice, bob) = (Peer::new(), Peer::new());
    let (alice_replica_of_bob, bob_replica_of_alice) = (bob.replica(), alice.replica());
    let (alice_feed, bob_feed) = (alice.feed.clone(), bob.feed.clone());
    let mut alice_space = space(alice.writer, vec![alice_replica_of_bob.clone()], MemBlobStore::new());
    let mut bob_space = space(bob.writer, vec![bob_replica_of_alice.clone()], MemBlobStore::new());
    alice_space.open().unwrap();
    bob_space.open().unwrap();

    // 1. Alice creates an item.
    log_with_context(Some("alice"), "creating an item");
    let created = alice_space
        .writer()
        .unwrap()
        .create_item(TASK, ObjectModel::MODEL_TYPE, Some(set("title", "from alice")))
        .unwrap();
    let item_id = created.item_id.clone();

    // 2. Bob receives it, and changes it.
    replicate(&alice_feed, &bob_replica_of_alice);
    assert!(bob_space.wait_until_timeframe(&created.timeframe(), WAIT));
    assert_eq!(title(&bob_space, &item_id), Some(Value::from("from alice")));
    log_with_context(Some("bob"), "changing the item");
    let changed = bob_space
        .writer()
        .unwrap()
        .mutate(item_id.clone(), set("title", "from bob"))
        .unwrap();

    // 3. Alice concurrently writes another property.
    alice_space
        .writer()
        .unwrap()
        .mutate(item_id.clone(), set("done", true))
        .unwrap();

    // 4. After exchanging feeds, both peers have the same state.
    replicate(&bob_feed, &alice_replica_of_bob);
    replicate(&alice_feed, &bob_replica_of_alice);
    let end = Timeframe::merge([&alice_space.end_timeframe(), &bob_space.end_timeframe()]);
    assert!(alice_space.wait_until_timeframe(&end, WAIT));
    assert!(bob_space.wait_until_timeframe(&end, WAIT));
    assert!(end.get(&changed.feed_key).is_some());

    assert_eq!(alice_space.timeframe(), bob_space.timeframe());
    assert_eq!(alice_space.get(&item_id).unwrap(), bob_space.get(&item_id).unwrap());
    assert_eq!(title(&alice_space, &item_id), Some(Value::from("from bob")));
    let item = alice_space.get(&item_id).unwrap();
    let view = ObjectModel::view(item.model_state()).unwrap();
    assert_eq!(view.get("done"), Some(&Value::from(true)));
}

#[test]
fn paused_space_applies_nothing() {
    setup_logger(LevelFilter::Info);
    let Peer { writer, .. } = Peer::new();
    let mut space = space(writer, Vec::new(), MemBlobStore::new());
    space.open().unwrap();

    // 1. Pause, then write.
    space.pause().unwrap();
    let receipt = space
        .writer()
        .unwrap()
        .create_item(TASK, ObjectModel::MODEL_TYPE, None)
        .unwrap();

    // 2. The write is not applied while paused.
    assert!(!space.wait_until_timeframe(&receipt.timeframe(), Duration::from_millis(200)));
    assert!(space.get(&receipt.item_id).is_err());

    // 3. It is applied once unpaused.
    space.unpause().unwrap();
    assert!(space.wait_until_timeframe(&receipt.timeframe(), WAIT));
    assert!(space.get(&receipt.item_id).is_ok());
}

#[test]
fn feeds_can_be_added_while_open() {
    setup_logger(LevelFilter::Info);
    let (local, remote) = (Peer::new(), Peer::new());
    remote.genesis("x", Timeframe::new());
    remote.set("x", "title", "hello", Timeframe::new().with(remote.key(), 0));
    let local_feed = local.feed.clone();
    let mut space = space(local.writer, Vec::new(), MemBlobStore::new());
    space.open().unwrap();

    // 1. The local feed cannot be added twice.
    assert!(matches!(
        space.add_feed(local_feed),
        Err(SpaceError::DuplicateFeed(_))
    ));

    // 2. A new feed is replayed as soon as it is added.
    space.add_feed(remote.feed.clone()).unwrap();
    assert_eq!(space.feed_keys().len(), 2);
    assert!(space.wait_until_timeframe(&space.end_timeframe(), WAIT));
    assert_eq!(title(&space, &ItemId::from("x")), Some(Value::from("hello")));
}

#[test]
fn item_subscriptions_see_every_change() {
    setup_logger(LevelFilter::Info);
    let Peer { writer, .. } = Peer::new();
    let mut space = space(writer, Vec::new(), MemBlobStore::new());
    space.open().unwrap();
    let created = space
        .writer()
        .unwrap()
        .create_item(TASK, ObjectModel::MODEL_TYPE, None)
        .unwrap();
    assert!(space.wait_until_timeframe(&created.timeframe(), WAIT));

    // 1. Subscribe, then change the item twice.
    let subscription = space.on_item_changed(created.item_id.clone());
    assert_eq!(subscription.item_id(), &created.item_id);
    for value in ["one", "two"] {
        space
            .writer()
            .unwrap()
            .mutate(created.item_id.clone(), set("title", value))
            .unwrap();
    }

    // 2. Both new values are delivered, in order.
    for expected in ["one", "two"] {
        let item = subscription.recv_timeout(WAIT).unwrap();
        let view = ObjectModel::view(item.model_state()).unwrap();
        assert_eq!(view.get("title"), Some(&Value::from(expected)));
    }

    // 3. Closing the space ends the subscription.
    space.close();
    assert!(subscription.recv().is_none());
}

#[test]
fn camera_reads_are_consistent() {
    setup_logger(LevelFilter::Info);
    let Peer { writer, .. } = Peer::new();
    let mut space = space(writer, Vec::new(), MemBlobStore::new());
    space.open().unwrap();
    let created = space
        .writer()
        .unwrap()
        .create_item(TASK, ObjectModel::MODEL_TYPE, None)
        .unwrap();
    assert!(space.wait_until_timeframe(&created.timeframe(), WAIT));

    let camera = space.camera();
    let snapshot = camera.snapshot();
    assert_eq!(snapshot.timeframe(), &created.timeframe());
    assert!(snapshot.get(&created.item_id).is_ok());
    assert_eq!(snapshot.filter(&ItemFilter::new().with_type(TASK)).len(), 1);
    assert_eq!(snapshot.query(|_| true).len(), 1);
    assert_eq!(snapshot.to_state().timeframe(), &created.timeframe());
}

#[test]
fn events_are_delivered_to_handlers() {
    setup_logger(LevelFilter::Info);
    let (open_sender, opened) = mpsc::channel();
    let (close_sender, closed) = mpsc::channel();
    let (insert_sender, inserted) = mpsc::channel();
    let (apply_sender, applied) = mpsc::channel();
    let (skip_sender, skipped) = mpsc::channel();
    let Peer { writer, .. } = Peer::new();

    let mut space = SpaceSpec::builder()
        .configuration(configuration())
        .blob_store(MemBlobStore::new())
        .registry(object_registry())
        .writer(writer)
        .on_open_space(move |event| open_sender.send(event.space_key).unwrap())
        .on_close_space(move |event| close_sender.send(event.timeframe.clone()).unwrap())
        .on_insert_item(move |event| insert_sender.send(event.item_id.clone()).unwrap())
        .on_apply_mutation(move |event| apply_sender.send((event.item_id.clone(), event.seq)).unwrap())
        .on_skip_mutation(move |event| skip_sender.send(event.reason.to_string()).unwrap())
        .build()
        .create();
    space.open().unwrap();

    // 1. Create an item, mutate it, and mutate an item that does not exist.
    let writer = space.writer().unwrap();
    let created = writer
        .create_item(TASK, ObjectModel::MODEL_TYPE, None)
        .unwrap();
    let changed = writer
        .mutate(created.item_id.clone(), set("title", "x"))
        .unwrap();
    let dangling = writer
        .mutate(ItemId::from("nowhere"), set("title", "y"))
        .unwrap();
    assert!(space.wait_until_timeframe(&dangling.timeframe(), WAIT));

    // 2. Closing the space flushes the remaining events.
    space.close();

    assert_eq!(drain(&opened), vec![SPACE]);
    assert_eq!(drain(&inserted), vec![created.item_id.clone()]);
    assert_eq!(drain(&applied), vec![(created.item_id.clone(), changed.seq)]);
    let reasons = drain(&skipped);
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("nowhere"));
    assert_eq!(drain(&closed), vec![dangling.timeframe()]);
}

#[test]
fn mutations_waiting_on_an_unknown_feed_are_reported() {
    setup_logger(LevelFilter::Info);
    let (buffer_sender, buffered) = mpsc::channel();
    let (stall_sender, stalls) = mpsc::channel();
    let (writer_peer, absent) = (Peer::new(), Peer::new());
    let feed = writer_peer.feed.clone();

    // 1. A block that depends on a feed the space does not replay.
    writer_peer.set("x", "title", "orphan", Timeframe::new().with(absent.key(), 0));

    let mut space = SpaceSpec::builder()
        .configuration(
            Configuration::builder()
                .space_key(SPACE)
                .open_timeout(Duration::from_millis(100))
                .poll_interval(Duration::from_millis(10))
                .stall_timeout(Duration::from_millis(100))
                .build(),
        )
        .blob_store(MemBlobStore::new())
        .registry(object_registry())
        .feeds(vec![feed.clone()])
        .on_buffer_mutation(move |event| buffer_sender.send((event.feed_key, event.missing.clone())).unwrap())
        .on_stall(move |event| stall_sender.send(event.missing.clone()).unwrap())
        .build()
        .create();

    // 2. Opening gives up waiting for the block after the open timeout.
    space.open().unwrap();
    assert_eq!(space.status(), SpaceStatus::Open);
    assert!(space.timeframe().is_empty());

    // 3. The block is reported as buffered, then as stalled, once.
    let expected_missing = Timeframe::new().with(absent.key(), 0);
    let stall = stalls.recv_timeout(WAIT).unwrap();
    assert_eq!(stall, expected_missing);
    space.close();
    assert_eq!(drain(&buffered), vec![(feed.key(), expected_missing)]);
    assert!(drain(&stalls).is_empty());
}

#[test]
fn opening_does_not_wait_for_a_halted_feed() {
    setup_logger(LevelFilter::Info);
    let (a, b) = (Peer::new(), Peer::new());
    let x = ItemId::from("x");

    // 1. Both feeds create X. Whichever genesis is applied second halts its feed.
    a.genesis("x", Timeframe::new());
    b.genesis("x", Timeframe::new());
    let mut space = reader_space(vec![a.feed.clone(), b.feed.clone()], MemBlobStore::new());

    // 2. Opening returns as soon as the other feed is replayed.
    let started = Instant::now();
    space.open().unwrap();
    assert!(started.elapsed() < WAIT / 2);
    assert_eq!(space.status(), SpaceStatus::Open);

    // 3. X exists, and exactly one of the two geneses was consumed.
    assert!(space.get(&x).is_ok());
    assert_eq!(space.timeframe().len(), 1);
    assert_eq!(space.timeframe().total_blocks(), 1);
}

#[test]
fn opening_stops_waiting_once_the_pipeline_stalls() {
    setup_logger(LevelFilter::Info);
    let (writer_peer, absent) = (Peer::new(), Peer::new());

    // 1. The only block depends on a feed the space does not replay.
    writer_peer.set("x", "title", "orphan", Timeframe::new().with(absent.key(), 0));
    let mut space = SpaceSpec::builder()
        .configuration(
            Configuration::builder()
                .space_key(SPACE)
                .open_timeout(WAIT)
                .poll_interval(Duration::from_millis(10))
                .stall_timeout(Duration::from_millis(100))
                .build(),
        )
        .blob_store(MemBlobStore::new())
        .registry(object_registry())
        .feeds(vec![writer_peer.feed.clone()])
        .build()
        .create();

    // 2. Opening gives up once the block has stayed buffered for the stall timeout, well before the
    //    open timeout.
    let started = Instant::now();
    space.open().unwrap();
    assert!(started.elapsed() < WAIT / 2);
    assert_eq!(space.status(), SpaceStatus::Open);
    assert!(space.timeframe().is_empty());
}

#[test]
fn failed_reads_are_retried() {
    setup_logger(LevelFilter::Info);
    let (error_sender, errors) = mpsc::channel();
    let peer = Peer::new();
    peer.genesis("x", Timeframe::new());
    peer.set("x", "title", "eventually", Timeframe::new().with(peer.key(), 0));

    // 1. A replica whose storage fails its next three reads.
    let (storage, failures_left) = FlakyFeedStorage::new();
    let replica = Feed::open_replica(peer.key(), storage).unwrap();
    replicate(&peer.feed, &replica);
    failures_left.store(3, Ordering::SeqCst);

    let mut space = SpaceSpec::builder()
        .configuration(configuration())
        .blob_store(MemBlobStore::new())
        .registry(object_registry())
        .feeds(vec![replica])
        .on_feed_read_error(move |event| error_sender.send((event.feed_key, event.seq)).unwrap())
        .build()
        .create();

    // 2. The space still replays the whole feed.
    space.open().unwrap();
    assert!(space.wait_until_timeframe(&space.end_timeframe(), WAIT));
    assert_eq!(title(&space, &ItemId::from("x")), Some(Value::from("eventually")));

    // 3. Every failure was reported against the block being read.
    space.close();
    let reported: Vec<(FeedKey, u64)> = drain(&errors);
    assert_eq!(reported, vec![(peer.key(), 0); 3]);
    assert_eq!(failures_left.load(Ordering::SeqCst), 0);
}

#[test]
fn snapshots_are_saved_automatically() {
    setup_logger(LevelFilter::Info);
    let (save_sender, saved) = mpsc::channel();
    let store = MemBlobStore::new();
    let Peer { writer, .. } = Peer::new();

    let mut space = SpaceSpec::builder()
        .configuration(
            Configuration::builder()
                .space_key(SPACE)
                .poll_interval(Duration::from_millis(10))
                .snapshot_interval(2)
                .build(),
        )
        .blob_store(store.clone())
        .registry(object_registry())
        .writer(writer)
        .on_save_snapshot(move |event| save_sender.send(event.timeframe.total_blocks()).unwrap())
        .build()
        .create();
    space.open().unwrap();

    // 1. Four writes.
    let mut last = None;
    for _ in 0..4 {
        last = Some(
            space
                .writer()
                .unwrap()
                .create_item(TASK, ObjectModel::MODEL_TYPE, None)
                .unwrap(),
        );
    }
    assert!(space.wait_until_timeframe(&last.unwrap().timeframe(), WAIT));

    // 2. Two snapshots: after the second and after the fourth block.
    space.close();
    assert_eq!(drain(&saved), vec![2, 4]);
    assert_eq!(store.len(), 2);
    assert_eq!(space.snapshots().unwrap().len(), 2);
}

#[test]
fn reopening_restores_the_latest_snapshot() {
    setup_logger(LevelFilter::Info);
    let store = MemBlobStore::new();
    let peer = Peer::new();
    let feed = peer.feed.clone();

    // 1. Write two items and save a snapshot.
    let expected = {
        let mut space = space(peer.writer, Vec::new(), store.clone());
        space.open().unwrap();
        let writer = space.writer().unwrap();
        writer.create_item(TASK, ObjectModel::MODEL_TYPE, None).unwrap();
        let last = writer.create_item(TASK, ObjectModel::MODEL_TYPE, None).unwrap();
        assert!(space.wait_until_timeframe(&last.timeframe(), WAIT));
        space.create_snapshot().unwrap();
        space.query(|_| true)
    };

    // 2. A space with no feeds at all opens from the snapshot.
    let (load_sender, loaded) = mpsc::channel();
    let mut restored = SpaceSpec::builder()
        .configuration(configuration())
        .blob_store(store.clone())
        .registry(object_registry())
        .on_load_snapshot(move |event| load_sender.send(event.timeframe.clone()).unwrap())
        .build()
        .create();
    restored.open().unwrap();
    assert_eq!(restored.query(|_| true), expected);
    assert_eq!(restored.timeframe(), Timeframe::new().with(feed.key(), 1));
    restored.close();
    assert_eq!(drain(&loaded), vec![Timeframe::new().with(feed.key(), 1)]);

    // 3. With the feed, replay resumes after the snapshot.
    let mut replayed = reader_space(vec![feed.clone()], store);
    replayed.open().unwrap();
    assert_eq!(replayed.query(|_| true), expected);
    assert_eq!(replayed.timeframe(), replayed.end_timeframe());
}

/// A blob store that cannot be reached.
#[derive(Clone)]
struct UnreachableBlobStore;

impl BlobStore for UnreachableBlobStore {
    fn get(&self, _id: &SnapshotId) -> Result<Option<Vec<u8>>, BlobStoreError> {
        Err(BlobStoreError::Unavailable("unreachable".to_string()))
    }

    fn set(&mut self, _id: &SnapshotId, _bytes: &[u8]) -> Result<(), BlobStoreError> {
        Err(BlobStoreError::Unavailable("unreachable".to_string()))
    }

    fn list(&self) -> Result<Vec<SnapshotInfo>, BlobStoreError> {
        Err(BlobStoreError::Unavailable("unreachable".to_string()))
    }
}

#[test]
fn opening_without_snapshot_or_feeds_fails() {
    setup_logger(LevelFilter::Info);

    // 1. No snapshot and no feed: the space cannot be opened.
    let mut space = SpaceSpec::builder()
        .configuration(configuration())
        .blob_store(UnreachableBlobStore)
        .build()
        .create();
    assert!(matches!(
        space.open(),
        Err(SpaceError::SnapshotUnavailable(_))
    ));
    assert_eq!(space.status(), SpaceStatus::Closed);

    // 2. With a feed, the space replays from the start instead.
    let peer = Peer::new();
    peer.genesis("x", Timeframe::new());
    space.add_feed(peer.feed.clone()).unwrap();
    space.open().unwrap();
    assert!(space.get(&ItemId::from("x")).is_ok());
}

#[test]
fn writes_are_stamped_with_the_current_timeframe() {
    setup_logger(LevelFilter::Info);
    let (local, remote) = (Peer::new(), Peer::new());
    remote.genesis("x", Timeframe::new());
    let local_feed = local.feed.clone();
    let mut space = space(local.writer, vec![remote.feed.clone()], MemBlobStore::new());
    space.open().unwrap();

    let receipt = space
        .writer()
        .unwrap()
        .mutate(ItemId::from("x"), set("title", "seen"))
        .unwrap();

    let envelope = local_feed.read(receipt.seq).unwrap().envelope().unwrap();
    assert_eq!(envelope.timeframe, Timeframe::new().with(remote.key(), 0));
    assert!(matches!(envelope.payload, EnvelopePayload::Mutation(_)));
}
