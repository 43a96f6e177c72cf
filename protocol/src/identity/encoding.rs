//! # Shareable Key Encoding
//!
//! Bech32 text forms of PARCEL keys, the strings people actually copy,
//! paste and read out loud:
//!
//! ```text
//! x-only public key (32 bytes) -> Bech32("npub", key)  -> npub1…
//! secret scalar     (32 bytes) -> Bech32("nsec", key)  -> nsec1…
//! ```
//!
//! The checksum catches any single-character typo. Decoding rejects bad
//! input in two stages: a cheap pre-check (prefix, length, charset) runs
//! first, and only input that survives it pays for the checksum
//! computation.

use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32, Hrp};
use k256::elliptic_curve::zeroize::Zeroize;

use crate::config::{BECH32_KEY_DATA_CHARS, PUBLIC_KEY_HRP, SECRET_KEY_HRP, SECRET_KEY_LENGTH};
use crate::crypto::keys::{KeyError, Keypair, PublicKey};

/// The bech32 data alphabet.
const CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// A key recovered from its shareable text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedKey {
    /// An `npub1…` string.
    Public(PublicKey),
    /// An `nsec1…` string.
    Secret(Keypair),
}

/// Encode a public key as `npub1…`.
pub fn encode_public(key: &PublicKey) -> String {
    encode(PUBLIC_KEY_HRP, &key.to_x_only())
}

/// Encode a keypair's secret scalar as `nsec1…`.
///
/// The result is as sensitive as the secret itself.
pub fn encode_secret(keypair: &Keypair) -> String {
    let mut bytes = keypair.secret_bytes();
    let encoded = encode(SECRET_KEY_HRP, &bytes);
    bytes.zeroize();
    encoded
}

/// Decode an `npub1…` string.
pub fn decode_public(input: &str) -> Result<PublicKey, KeyError> {
    let bytes = decode_payload(input, PUBLIC_KEY_HRP)?;
    PublicKey::from_x_only(&bytes)
        .map_err(|_| KeyError::MalformedIdentity("payload is not a curve point".into()))
}

/// Decode an `nsec1…` string into a keypair.
pub fn decode_secret(input: &str) -> Result<Keypair, KeyError> {
    let mut bytes = decode_payload(input, SECRET_KEY_HRP)?;
    let mut arr = [0u8; SECRET_KEY_LENGTH];
    arr.copy_from_slice(&bytes);
    bytes.zeroize();
    let keypair = Keypair::from_secret_bytes(&arr)
        .map_err(|_| KeyError::MalformedIdentity("payload is not a valid scalar".into()));
    arr.zeroize();
    keypair
}

/// Decode either form, dispatching on the prefix.
pub fn decode(input: &str) -> Result<DecodedKey, KeyError> {
    let lower = input.trim().to_ascii_lowercase();
    if lower.starts_with(&format!("{PUBLIC_KEY_HRP}1")) {
        decode_public(input.trim()).map(DecodedKey::Public)
    } else if lower.starts_with(&format!("{SECRET_KEY_HRP}1")) {
        decode_secret(input.trim()).map(DecodedKey::Secret)
    } else {
        Err(KeyError::MalformedIdentity(format!(
            "expected an {PUBLIC_KEY_HRP}1 or {SECRET_KEY_HRP}1 prefix"
        )))
    }
}

fn encode(hrp: &str, payload: &[u8]) -> String {
    let hrp = Hrp::parse(hrp).expect("static HRP is valid");
    bech32::encode::<Bech32>(hrp, payload).expect("encoding a 32-byte payload should never fail")
}

/// Cheap structural checks, then the checksum.
fn decode_payload(input: &str, expected_hrp: &str) -> Result<Vec<u8>, KeyError> {
    precheck(input, expected_hrp)?;

    let normalized = input.to_ascii_lowercase();
    let checked = CheckedHrpstring::new::<Bech32>(&normalized)
        .map_err(|e| KeyError::MalformedIdentity(format!("checksum: {e}")))?;

    let expected = Hrp::parse(expected_hrp).expect("static HRP is valid");
    if checked.hrp() != expected {
        return Err(KeyError::MalformedIdentity(format!(
            "expected prefix '{expected_hrp}', got '{}'",
            checked.hrp()
        )));
    }

    let payload: Vec<u8> = checked.byte_iter().collect();
    if payload.len() != SECRET_KEY_LENGTH {
        return Err(KeyError::MalformedIdentity(format!(
            "expected {SECRET_KEY_LENGTH} payload bytes, got {}",
            payload.len()
        )));
    }
    Ok(payload)
}

fn precheck(input: &str, expected_hrp: &str) -> Result<(), KeyError> {
    let expected_len = expected_hrp.len() + 1 + BECH32_KEY_DATA_CHARS;
    if input.len() != expected_len {
        return Err(KeyError::MalformedIdentity(format!(
            "expected {expected_len} characters, got {}",
            input.len()
        )));
    }

    let has_lower = input.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = input.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(KeyError::MalformedIdentity("mixed case".into()));
    }

    let lower = input.to_ascii_lowercase();
    let Some(data) = lower.strip_prefix(&format!("{expected_hrp}1")) else {
        return Err(KeyError::MalformedIdentity(format!(
            "expected prefix '{expected_hrp}1'"
        )));
    };

    if let Some(bad) = data.chars().find(|c| !CHARSET.contains(*c)) {
        return Err(KeyError::MalformedIdentity(format!(
            "invalid character '{bad}'"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_roundtrip() {
        let pk = Keypair::generate().public_key();
        let encoded = encode_public(&pk);
        assert!(encoded.starts_with("npub1"));
        assert_eq!(encoded.len(), 63);
        assert_eq!(decode_public(&encoded).unwrap().to_x_only(), pk.to_x_only());
    }

    #[test]
    fn secret_roundtrip() {
        let kp = Keypair::generate();
        let encoded = encode_secret(&kp);
        assert!(encoded.starts_with("nsec1"));
        let restored = decode_secret(&encoded).unwrap();
        assert_eq!(restored.secret_bytes(), kp.secret_bytes());
    }

    #[test]
    fn known_vector_from_relay_ecosystem() {
        // Published NIP-19 test vector.
        let pk = PublicKey::from_hex(
            "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d",
        )
        .unwrap();
        assert_eq!(
            encode_public(&pk),
            "npub180cvv07tjdrrgpa0j7j7tmnyl2yr6yr7l8j4s3evf6u64th6gkwsyjh6w6"
        );
    }

    #[test]
    fn every_single_character_corruption_is_rejected() {
        let encoded = encode_public(&Keypair::generate().public_key());
        let data_start = "npub1".len();

        for i in data_start..encoded.len() {
            let original = encoded.as_bytes()[i] as char;
            let replacement = CHARSET.chars().find(|c| *c != original).unwrap();
            let mut corrupted = encoded.clone();
            corrupted.replace_range(i..i + 1, &replacement.to_string());

            assert!(
                matches!(decode_public(&corrupted), Err(KeyError::MalformedIdentity(_))),
                "corruption at position {i} was accepted"
            );
        }
    }

    #[test]
    fn precheck_rejects_before_checksum() {
        let encoded = encode_public(&Keypair::generate().public_key());

        // Too short.
        assert!(matches!(
            precheck(&encoded[..encoded.len() - 1], PUBLIC_KEY_HRP),
            Err(KeyError::MalformedIdentity(_))
        ));

        // 'b' is not in the bech32 alphabet.
        let mut bad_char = encoded.clone();
        bad_char.replace_range(10..11, "b");
        let err = decode_public(&bad_char).unwrap_err();
        assert!(err.to_string().contains("invalid character"));

        // Mixed case.
        let mut mixed = encoded.clone();
        mixed.replace_range(0..1, "N");
        assert!(precheck(&mixed, PUBLIC_KEY_HRP).is_err());
    }

    #[test]
    fn wrong_prefix_is_rejected() {
        let kp = Keypair::generate();
        let nsec = encode_secret(&kp);
        assert!(matches!(
            decode_public(&nsec),
            Err(KeyError::MalformedIdentity(_))
        ));
        let npub = encode_public(&kp.public_key());
        assert!(decode_secret(&npub).is_err());
    }

    #[test]
    fn uppercase_is_accepted() {
        let pk = Keypair::generate().public_key();
        let upper = encode_public(&pk).to_ascii_uppercase();
        assert_eq!(decode_public(&upper).unwrap(), pk);
    }

    #[test]
    fn decode_dispatches_on_prefix() {
        let kp = Keypair::generate();
        match decode(&encode_public(&kp.public_key())).unwrap() {
            DecodedKey::Public(pk) => assert_eq!(pk, kp.public_key()),
            other => panic!("unexpected {other:?}"),
        }
        match decode(&encode_secret(&kp)).unwrap() {
            DecodedKey::Secret(restored) => assert_eq!(restored, kp),
            other => panic!("unexpected {other:?}"),
        }
        assert!(decode("note1abc").is_err());
    }

    #[test]
    fn public_key_parse_accepts_npub_and_hex() {
        let pk = Keypair::generate().public_key();
        assert_eq!(PublicKey::parse(&encode_public(&pk)).unwrap(), pk);
        assert_eq!(PublicKey::parse(&pk.to_hex()).unwrap(), pk);
        assert_eq!(PublicKey::parse(&pk.to_compressed_hex()).unwrap(), pk);
    }
}
