//! # Hashing Utilities
//!
//! SHA-256 is the only hash PARCEL needs: event identifiers are SHA-256 of
//! the canonical serialization (fixed by the relay wire format), and token
//! redemptions sign SHA-256 of the proof identifier. One function, one
//! dependency, nothing to configure.

use sha2::{Digest, Sha256};

use crate::config::X_ONLY_KEY_LENGTH;

/// Length of a SHA-256 digest in bytes.
pub const DIGEST_LENGTH: usize = 32;

// Digests are signed directly as BIP-340 messages, which share the 32-byte width.
const _: () = assert!(DIGEST_LENGTH == X_ONLY_KEY_LENGTH);

/// Compute the SHA-256 digest of `data`.
///
/// # Example
///
/// ```
/// use parcel_protocol::crypto::sha256;
///
/// let digest = sha256(b"abc");
/// assert_eq!(digest.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}
