/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! "Inert" types that are passed around, stored, and inspected, but have no active behavior.
//!
//! All of the types in this module follow the newtype pattern. Keys and hashes are fixed-size byte
//! arrays; identifiers chosen by applications (item ids, item types, model types) are strings.

use std::fmt::{self, Debug, Display, Formatter};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};
use rand_core::{OsRng, RngCore};

use super::crypto_primitives::{CryptoHasher, Digest, VerifyingKey};

/// Identifies one append-only feed. This is the byte representation of the feed writer's Ed25519
/// verifying key, so exactly one signing key can ever produce blocks for a given feed.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct FeedKey([u8; 32]);

impl FeedKey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Get the verifying key that this feed key encodes.
    pub fn verifying_key(&self) -> Result<VerifyingKey, ed25519_dalek::SignatureError> {
        VerifyingKey::from_bytes(&self.0)
    }
}

impl From<VerifyingKey> for FeedKey {
    fn from(verifying_key: VerifyingKey) -> Self {
        Self(verifying_key.to_bytes())
    }
}

impl From<&VerifyingKey> for FeedKey {
    fn from(verifying_key: &VerifyingKey) -> Self {
        Self(verifying_key.to_bytes())
    }
}

impl Display for FeedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&short_base64(&self.0))
    }
}

impl Debug for FeedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "FeedKey({})", short_base64(&self.0))
    }
}

/// Identifies a space, the logical unit of replication.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct SpaceKey([u8; 32]);

impl SpaceKey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for SpaceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&short_base64(&self.0))
    }
}

impl Debug for SpaceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SpaceKey({})", short_base64(&self.0))
    }
}

/// A SHA-256 hash. Snapshots are content-addressed by the `CryptoHash` of their encoded bytes.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Compute the hash of `data`.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = CryptoHasher::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// The full URL-safe base64 encoding of the hash. Used to name blobs on disk.
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Parse a hash from its [`to_base64`](Self::to_base64) form.
    pub fn from_base64(encoded: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        Some(Self(bytes.try_into().ok()?))
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&short_base64(&self.0))
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "CryptoHash({})", short_base64(&self.0))
    }
}

/// Signature represented in bytes.
#[derive(Clone, Copy, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({})", short_base64(&self.0))
    }
}

/// Identifier of an item, chosen by the writer of the item's genesis block.
#[derive(
    Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, BorshSerialize, BorshDeserialize,
)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh, random item id.
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Application-level type of an item, e.g. `"example.com/type/task"`.
#[derive(
    Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, BorshSerialize, BorshDeserialize,
)]
pub struct ItemType(String);

impl ItemType {
    pub fn new(item_type: impl Into<String>) -> Self {
        Self(item_type.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemType {
    fn from(item_type: &str) -> Self {
        Self(item_type.to_string())
    }
}

/// Names the [model](crate::model::Model) whose fold function interprets an item's mutations.
#[derive(
    Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, BorshSerialize, BorshDeserialize,
)]
pub struct ModelType(String);

impl ModelType {
    pub fn new(model_type: impl Into<String>) -> Self {
        Self(model_type.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ModelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelType {
    fn from(model_type: &str) -> Self {
        Self(model_type.to_string())
    }
}

/// Opaque, model-specific state of an item. Only the item's model knows how to interpret it.
#[derive(Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct ModelState(Vec<u8>);

impl ModelState {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> &Vec<u8> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for ModelState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ModelState({} bytes)", self.0.len())
    }
}

/// Get a more readable representation of a byte sequence by base64-encoding it and taking the first
/// 7 characters.
pub(crate) fn short_base64(bytes: &[u8]) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}
