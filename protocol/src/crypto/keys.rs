//! # Key Management
//!
//! secp256k1 keypair generation and encoding for PARCEL identities.
//!
//! Every participant is a single secp256k1 keypair. The same key signs
//! relay events (BIP-340 Schnorr over the x-only point), agrees on message
//! keys (ECDH), and unlocks tokens that were locked to it.
//!
//! ## Two public encodings
//!
//! - **x-only** (32 bytes): BIP-340 form, used in events and `npub` strings.
//! - **compressed** (33 bytes): SEC1 form, used as a token lock condition.
//!
//! An x-only key names two points (`P` and `-P`). For BIP-340 they are the
//! same identity, so [`PublicKey`] equality is defined on the x-only bytes.
//!
//! ## Security considerations
//!
//! - Secret scalars are zeroized on drop (thanks, `elliptic-curve`).
//! - Generation draws from `OsRng` and resamples until the scalar lies in
//!   `[1, n-1]`.
//! - Key bytes are never logged. `Debug` prints the public half only.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::zeroize::Zeroize;
use k256::schnorr::{SigningKey, VerifyingKey};
use k256::{AffinePoint, SecretKey};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

use crate::config::{COMPRESSED_KEY_LENGTH, SECRET_KEY_LENGTH, X_ONLY_KEY_LENGTH};

/// Errors that can occur during key operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// A text-encoded key failed its prefix, length, charset, or checksum check.
    #[error("malformed identity: {0}")]
    MalformedIdentity(String),

    #[error("invalid secret key: not a scalar in [1, n-1]")]
    InvalidSecretKey,

    /// The supplied public key is not a point on secp256k1.
    #[error("invalid counterparty key: not a valid secp256k1 point")]
    InvalidCounterpartyKey,
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// A PARCEL identity keypair.
///
/// `Keypair` intentionally does NOT implement `Serialize`. Exporting a
/// secret should be a deliberate act: use [`secret_bytes`](Self::secret_bytes),
/// [`secret_hex`](Self::secret_hex), or the `nsec` encoding in
/// [`identity`](crate::identity).
///
/// # Examples
///
/// ```
/// use parcel_protocol::crypto::keys::Keypair;
///
/// let kp = Keypair::generate();
/// let again = Keypair::from_secret_bytes(&kp.secret_bytes()).unwrap();
/// assert_eq!(kp.public_key(), again.public_key());
/// ```
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS RNG.
    ///
    /// Candidates that are zero or not below the curve order are thrown
    /// away and redrawn. The chance of a single rejection is about 2^-128.
    pub fn generate() -> Self {
        loop {
            let mut candidate = [0u8; SECRET_KEY_LENGTH];
            OsRng.fill_bytes(&mut candidate);
            let parsed = Self::from_secret_bytes(&candidate);
            candidate.zeroize();
            if let Ok(keypair) = parsed {
                return keypair;
            }
        }
    }

    /// Rebuild a keypair from a raw 32-byte scalar.
    ///
    /// The public key is always re-derived; there is no way to pair a
    /// secret with an independently supplied public key.
    pub fn from_secret_bytes(bytes: &[u8; SECRET_KEY_LENGTH]) -> Result<Self, KeyError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        let signing_key =
            SigningKey::from_bytes(bytes).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self {
            secret,
            signing_key,
        })
    }

    /// Rebuild a keypair from a hex-encoded scalar.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let mut bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        if bytes.len() != SECRET_KEY_LENGTH {
            bytes.zeroize();
            return Err(KeyError::InvalidSecretKey);
        }
        let mut arr = [0u8; SECRET_KEY_LENGTH];
        arr.copy_from_slice(&bytes);
        bytes.zeroize();
        let result = Self::from_secret_bytes(&arr);
        arr.zeroize();
        result
    }

    /// The public half of this identity.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            point: self.secret.public_key(),
        }
    }

    /// Export the raw 32-byte scalar.
    ///
    /// **Handle with care.** The caller owns the copy and is responsible
    /// for zeroing it.
    pub fn secret_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        let mut out = [0u8; SECRET_KEY_LENGTH];
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// Export the scalar as lowercase hex.
    pub fn secret_hex(&self) -> String {
        let mut bytes = self.secret_bytes();
        let encoded = hex::encode(bytes);
        bytes.zeroize();
        encoded
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair(pub={})", self.public_key().to_hex())
    }
}

impl PartialEq for Keypair {
    /// Compares public keys. Secret material is not compared.
    fn eq(&self, other: &Self) -> bool {
        self.public_key().to_compressed() == other.public_key().to_compressed()
    }
}

impl Eq for Keypair {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// The public half of a PARCEL identity.
#[derive(Clone, Copy)]
pub struct PublicKey {
    point: k256::PublicKey,
}

impl PublicKey {
    /// Parse a 32-byte BIP-340 x-only key, lifting it to the even-y point.
    pub fn from_x_only(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != X_ONLY_KEY_LENGTH {
            return Err(KeyError::InvalidCounterpartyKey);
        }
        let mut sec1 = [0u8; COMPRESSED_KEY_LENGTH];
        sec1[0] = 0x02;
        sec1[1..].copy_from_slice(bytes);
        Self::from_sec1(&sec1)
    }

    /// Parse a SEC1-encoded key (33-byte compressed or 65-byte uncompressed).
    pub fn from_sec1(bytes: &[u8]) -> Result<Self, KeyError> {
        let point =
            k256::PublicKey::from_sec1_bytes(bytes).map_err(|_| KeyError::InvalidCounterpartyKey)?;
        Ok(Self { point })
    }

    /// Parse a hex key. 64 characters are read as x-only, anything else as SEC1.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidCounterpartyKey)?;
        if bytes.len() == X_ONLY_KEY_LENGTH {
            Self::from_x_only(&bytes)
        } else {
            Self::from_sec1(&bytes)
        }
    }

    /// Parse user input: an `npub1…` string or a hex key.
    pub fn parse(input: &str) -> Result<Self, KeyError> {
        let input = input.trim();
        if input
            .get(..crate::config::PUBLIC_KEY_HRP.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(crate::config::PUBLIC_KEY_HRP))
        {
            crate::identity::decode_public(input)
        } else {
            Self::from_hex(input)
        }
    }

    /// The 32-byte BIP-340 x-only encoding.
    pub fn to_x_only(&self) -> [u8; X_ONLY_KEY_LENGTH] {
        let compressed = self.to_compressed();
        let mut out = [0u8; X_ONLY_KEY_LENGTH];
        out.copy_from_slice(&compressed[1..]);
        out
    }

    /// The 33-byte SEC1 compressed encoding.
    pub fn to_compressed(&self) -> [u8; COMPRESSED_KEY_LENGTH] {
        let encoded = self.point.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_KEY_LENGTH];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Hex of the x-only encoding (64 characters). This is the event form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_x_only())
    }

    /// Hex of the compressed encoding (66 characters). This is the lock form.
    pub fn to_compressed_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }

    pub(crate) fn as_affine(&self) -> &AffinePoint {
        self.point.as_affine()
    }

    pub(crate) fn verifying_key(&self) -> Result<VerifyingKey, KeyError> {
        VerifyingKey::from_bytes(&self.to_x_only()).map_err(|_| KeyError::InvalidCounterpartyKey)
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_x_only() == other.to_x_only()
    }
}

impl Eq for PublicKey {}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_x_only().hash(state);
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// secp256k1 group order n, big-endian.
    const CURVE_ORDER: [u8; 32] = [
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36,
        0x41, 0x41,
    ];

    #[test]
    fn generate_produces_distinct_keys() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn secret_bytes_roundtrip() {
        let kp = Keypair::generate();
        let restored = Keypair::from_secret_bytes(&kp.secret_bytes()).unwrap();
        assert_eq!(kp, restored);
        assert_eq!(
            kp.public_key().to_compressed(),
            restored.public_key().to_compressed()
        );
    }

    #[test]
    fn hex_roundtrip() {
        let kp = Keypair::generate();
        let restored = Keypair::from_hex(&kp.secret_hex()).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn zero_scalar_is_rejected() {
        assert_eq!(
            Keypair::from_secret_bytes(&[0u8; 32]).unwrap_err(),
            KeyError::InvalidSecretKey
        );
    }

    #[test]
    fn curve_order_and_above_are_rejected() {
        assert!(Keypair::from_secret_bytes(&CURVE_ORDER).is_err());
        assert!(Keypair::from_secret_bytes(&[0xFF; 32]).is_err());

        let mut just_below = CURVE_ORDER;
        just_below[31] -= 1;
        assert!(Keypair::from_secret_bytes(&just_below).is_ok());
    }

    #[test]
    fn known_scalar_one_maps_to_generator() {
        let mut one = [0u8; 32];
        one[31] = 1;
        let kp = Keypair::from_secret_bytes(&one).unwrap();
        assert_eq!(
            kp.public_key().to_compressed_hex(),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(Keypair::from_hex("abcd").is_err());
        assert!(Keypair::from_hex("not hex at all").is_err());
    }

    #[test]
    fn x_only_roundtrip_preserves_identity() {
        let kp = Keypair::generate();
        let pk = kp.public_key();
        let lifted = PublicKey::from_x_only(&pk.to_x_only()).unwrap();
        assert_eq!(pk, lifted);
        assert_eq!(pk.to_x_only(), lifted.to_x_only());
    }

    #[test]
    fn compressed_roundtrip_is_exact() {
        let pk = Keypair::generate().public_key();
        let parsed = PublicKey::from_sec1(&pk.to_compressed()).unwrap();
        assert_eq!(parsed.to_compressed(), pk.to_compressed());
    }

    #[test]
    fn from_hex_accepts_both_encodings() {
        let pk = Keypair::generate().public_key();
        assert_eq!(PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
        assert_eq!(PublicKey::from_hex(&pk.to_compressed_hex()).unwrap(), pk);
    }

    #[test]
    fn off_curve_x_is_rejected() {
        // x >= p is not a field element.
        assert_eq!(
            PublicKey::from_x_only(&[0xFF; 32]).unwrap_err(),
            KeyError::InvalidCounterpartyKey
        );
        assert!(PublicKey::from_x_only(&[0u8; 31]).is_err());
    }

    #[test]
    fn debug_never_prints_secret() {
        let kp = Keypair::generate();
        let debug = format!("{:?}", kp);
        assert!(!debug.contains(&kp.secret_hex()));
        assert!(debug.contains(&kp.public_key().to_hex()));
    }
}
