//! Fixtures: peers that write envelopes into their own feeds, and helpers to replicate those feeds.

use rand_core::OsRng;

use echo_rs::{
    feed::{
        EnvelopePayload, Feed, FeedWriter, GenesisPayload, MemFeedStorage, MutationEnvelope,
    },
    model::{
        object_model::{ObjectModel, ObjectMutationBuilder},
        registry::ModelRegistry,
    },
    timeframe::Timeframe,
    types::{
        crypto_primitives::SigningKey,
        data_types::{FeedKey, ItemId},
        value::Value,
    },
};

pub(crate) const TASK: &str = "test/task";

/// A peer with its own writable feed.
pub(crate) struct Peer {
    pub(crate) feed: Feed,
    pub(crate) writer: FeedWriter,
}

impl Peer {
    pub(crate) fn new() -> Peer {
        let signing_key = SigningKey::generate(&mut OsRng);
        let (feed, writer) = Feed::create_writable(signing_key, MemFeedStorage::new()).unwrap();
        Peer { feed, writer }
    }

    pub(crate) fn key(&self) -> FeedKey {
        self.feed.key()
    }

    /// An empty read-only replica of this peer's feed, as another peer would hold it.
    pub(crate) fn replica(&self) -> Feed {
        Feed::open_replica(self.key(), MemFeedStorage::new()).unwrap()
    }

    pub(crate) fn write(&self, envelope: MutationEnvelope) -> u64 {
        self.writer.append(envelope.encode().unwrap()).unwrap()
    }

    /// Append the genesis of an object item with id `item_id`.
    pub(crate) fn genesis(&self, item_id: &str, deps: Timeframe) -> u64 {
        self.write(genesis_envelope(item_id, None, deps))
    }

    /// Append a mutation that sets `key` to `value` on `item_id`.
    pub(crate) fn set(&self, item_id: &str, key: &str, value: impl Into<Value>, deps: Timeframe) -> u64 {
        self.write(MutationEnvelope {
            item_id: ItemId::from(item_id),
            timeframe: deps,
            payload: EnvelopePayload::Mutation(set(key, value)),
        })
    }
}

pub(crate) fn genesis_envelope(
    item_id: &str,
    parent_id: Option<&str>,
    deps: Timeframe,
) -> MutationEnvelope {
    MutationEnvelope {
        item_id: ItemId::from(item_id),
        timeframe: deps,
        payload: EnvelopePayload::Genesis(GenesisPayload {
            item_type: TASK.into(),
            model_type: ObjectModel::MODEL_TYPE.into(),
            parent_id: parent_id.map(ItemId::from),
            mutation: None,
        }),
    }
}

/// An object mutation that sets one key.
pub(crate) fn set(key: &str, value: impl Into<Value>) -> Vec<u8> {
    ObjectMutationBuilder::new().set(key, value).build().unwrap()
}

/// A registry that knows the object model.
pub(crate) fn object_registry() -> ModelRegistry {
    ModelRegistry::new().with(ObjectModel).unwrap()
}

/// Copy the blocks of `from` that `to` does not have yet.
pub(crate) fn replicate(from: &Feed, to: &Feed) {
    for seq in to.length()..from.length() {
        to.replicate(from.read(seq).unwrap()).unwrap();
    }
}

/// A feed key that is not backed by a real signing key. Enough for timeframe arithmetic.
pub(crate) fn feed_key(byte: u8) -> FeedKey {
    FeedKey::new([byte; 32])
}

pub(crate) fn tf(entries: &[(FeedKey, u64)]) -> Timeframe {
    Timeframe::create(entries.iter().copied()).unwrap()
}
