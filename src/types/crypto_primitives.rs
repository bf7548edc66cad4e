/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide two categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate. Used to content-address snapshots.
//! 2. **Digital Signatures**: provided by the [`ed25519_dalek`] crate. Used to bind every feed block
//!    to the feed's designated writer.

use ed25519_dalek::{Signature, Signer, Verifier};

use super::data_types::{FeedKey, SignatureBytes};

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

pub use ed25519_dalek::{SigningKey, VerifyingKey};

/// A facade around [`SigningKey`] that implements method for [`sign`](Self::sign)-ing messages as well
/// as a getter for the [`feed_key`](Self::feed_key) associated with the signing key.
#[derive(Clone)]
pub(crate) struct Keypair(SigningKey);

impl Keypair {
    /// Create a `Keypair` that wraps over `signing_key`.
    pub(crate) fn new(signing_key: SigningKey) -> Keypair {
        Keypair(signing_key)
    }

    /// Sign an arbitrary `message` with the `Keypair`.
    pub(crate) fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes::new(self.0.sign(message).to_bytes())
    }

    /// Get the key of the feed that this `Keypair` writes.
    pub(crate) fn feed_key(&self) -> FeedKey {
        FeedKey::from(self.0.verifying_key())
    }
}

/// Check that `signature` is a valid signature by the writer of `feed_key` over `message`.
pub(crate) fn verify(feed_key: &FeedKey, message: &[u8], signature: &SignatureBytes) -> bool {
    let Ok(verifying_key) = feed_key.verifying_key() else {
        return false;
    };
    let signature = Signature::from_bytes(&signature.bytes());
    verifying_key.verify(message, &signature).is_ok()
}
