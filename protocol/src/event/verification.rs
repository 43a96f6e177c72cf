//! Event verification: recompute the id, then check the signature.
//!
//! The checks run cheapest first. Hex decoding and the hash come before
//! any curve math, so garbage off the wire costs almost nothing to
//! reject. Every failure collapses to [`EventError::InvalidEvent`]; a
//! caller that gets an error discards the event entirely.

use thiserror::Error;

use super::types::{compute_id, is_lower_hex, SignedEvent};
use crate::config::SIGNATURE_LENGTH;
use crate::crypto::signatures::{verify_digest, Signature, SignatureError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The event failed verification. The message names the first check
    /// that failed.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Signing failed while building an event.
    #[error("event signing failed: {0}")]
    Signing(#[from] SignatureError),

    /// JSON (de)serialization of the event failed.
    #[error("event serialization failed: {0}")]
    Serialization(String),
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

/// Verify an event's id and signature.
///
/// 1. `pubkey` is 64 lowercase hex chars naming an x-only curve point.
/// 2. `id` is the lowercase hex of `SHA-256` of the canonical serialization.
/// 3. `sig` is a valid BIP-340 signature over `id` under `pubkey`.
pub fn verify(event: &SignedEvent) -> Result<(), EventError> {
    let author = event.author()?;

    let expected = compute_id(
        &event.pubkey,
        event.created_at,
        event.kind,
        &event.tags,
        &event.content,
    )?;
    // String compare: one event, one id spelling. Dedup keys on it.
    let expected_hex = hex::encode(expected);
    if event.id != expected_hex {
        return Err(EventError::InvalidEvent(format!(
            "id mismatch: expected {expected_hex}, got {}",
            event.id
        )));
    }

    if !is_lower_hex(&event.sig, SIGNATURE_LENGTH) {
        return Err(EventError::InvalidEvent(
            "signature is not 128 lowercase hex chars".into(),
        ));
    }
    let signature = Signature::from_hex(&event.sig)
        .map_err(|_| EventError::InvalidEvent("malformed signature".into()))?;
    verify_digest(&author, &expected, &signature)
        .map_err(|_| EventError::InvalidEvent("signature does not verify".into()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use crate::event::{build, Tag};

    fn sample() -> SignedEvent {
        let kp = Keypair::generate();
        let recipient = Keypair::generate().public_key();
        build(
            &kp,
            4,
            vec![Tag::pubkey(&recipient)],
            "c2VjcmV0?iv=AAAAAAAAAAAAAAAAAAAAAA==",
            1_700_000_000,
        )
        .unwrap()
    }

    fn flip_bit(s: &str, byte: usize, bit: u8) -> String {
        let mut bytes = s.as_bytes().to_vec();
        bytes[byte] ^= 1 << bit;
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn fresh_event_verifies() {
        let event = sample();
        assert_eq!(verify(&event), Ok(()));
        assert!(event.is_valid());
    }

    #[test]
    fn any_content_bit_flip_fails() {
        let event = sample();
        for byte in 0..event.content.len() {
            for bit in 0..7 {
                let mut tampered = event.clone();
                tampered.content = flip_bit(&event.content, byte, bit);
                assert!(
                    matches!(verify(&tampered), Err(EventError::InvalidEvent(_))),
                    "content flip at byte {byte} bit {bit} accepted"
                );
            }
        }
    }

    #[test]
    fn tag_bit_flip_fails() {
        let event = sample();
        let value = event.tags[0].value().unwrap().to_string();
        for byte in [0, 31, value.len() - 1] {
            let mut tampered = event.clone();
            tampered.tags = vec![Tag::new("p", [flip_bit(&value, byte, 0)])];
            assert!(verify(&tampered).is_err());
        }

        let mut renamed = event.clone();
        renamed.tags = vec![Tag::new("q", [value])];
        assert!(verify(&renamed).is_err());
    }

    #[test]
    fn signature_bit_flip_fails() {
        let event = sample();
        let sig = hex::decode(&event.sig).unwrap();
        for byte in 0..sig.len() {
            let mut bytes = sig.clone();
            bytes[byte] ^= 0x80;
            let mut tampered = event.clone();
            tampered.sig = hex::encode(bytes);
            assert!(
                matches!(verify(&tampered), Err(EventError::InvalidEvent(_))),
                "sig flip at byte {byte} accepted"
            );
        }
    }

    #[test]
    fn recomputed_id_without_resigning_fails() {
        // Tamper, then "fix" the id. The signature still binds the old id.
        let event = sample();
        let mut tampered = event.clone();
        tampered.content.push('!');
        tampered.id = hex::encode(
            compute_id(
                &tampered.pubkey,
                tampered.created_at,
                tampered.kind,
                &tampered.tags,
                &tampered.content,
            )
            .unwrap(),
        );
        let err = verify(&tampered).unwrap_err();
        assert!(err.to_string().contains("signature"));
    }

    #[test]
    fn swapped_author_fails() {
        let event = sample();
        let mut tampered = event.clone();
        tampered.pubkey = Keypair::generate().public_key().to_hex();
        assert!(verify(&tampered).is_err());
    }

    #[test]
    fn malformed_hex_fields_fail() {
        let event = sample();

        let mut bad_id = event.clone();
        bad_id.id = "zz".repeat(32);
        assert!(verify(&bad_id).is_err());

        let mut bad_sig = event.clone();
        bad_sig.sig = "00".into();
        assert!(verify(&bad_sig).is_err());

        let mut bad_key = event.clone();
        bad_key.pubkey = "ff".repeat(32);
        assert!(verify(&bad_key).is_err());
    }

    #[test]
    fn non_canonical_spellings_fail() {
        let event = sample();

        let mut upper_id = event.clone();
        upper_id.id = event.id.to_uppercase();
        assert_ne!(upper_id.id, event.id);
        assert!(matches!(verify(&upper_id), Err(EventError::InvalidEvent(_))));

        let mut upper_sig = event.clone();
        upper_sig.sig = event.sig.to_uppercase();
        assert!(verify(&upper_sig).is_err());

        // Same point, compressed SEC1 spelling.
        let author = event.author().unwrap();
        let mut compressed = event.clone();
        compressed.pubkey = author.to_compressed_hex();
        assert!(compressed.author().is_err());
        assert!(verify(&compressed).is_err());
    }

    #[test]
    fn json_roundtrip_still_verifies() {
        let event = sample();
        let json = event.to_json().unwrap();
        let parsed = SignedEvent::from_json(&json).unwrap();
        assert_eq!(parsed, event);
        assert!(parsed.is_valid());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let event = sample();
        let mut value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        value["extra"] = serde_json::json!(1);
        assert!(SignedEvent::from_json(&value.to_string()).is_err());
    }
}
