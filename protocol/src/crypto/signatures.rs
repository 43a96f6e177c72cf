//! # Digital Signatures
//!
//! BIP-340 Schnorr signing and verification over secp256k1.
//!
//! Both sub-protocols sign a 32-byte digest, never an arbitrary message:
//! events sign their content-addressed id, token redemptions sign
//! `SHA-256(proof id)`. Keeping the API digest-only means nobody can
//! accidentally sign an un-hashed, attacker-chosen blob.
//!
//! Signing mixes 32 bytes of fresh OS randomness into the nonce (the
//! BIP-340 `aux_rand` input), so signatures over the same digest differ.

use k256::schnorr::Signature as SchnorrSignature;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use thiserror::Error;

use super::hash::DIGEST_LENGTH;
use super::keys::{Keypair, PublicKey};
use crate::config::SIGNATURE_LENGTH;

/// Errors during signature operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid signature bytes: expected {SIGNATURE_LENGTH} bytes")]
    InvalidSignatureBytes,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("signing failed")]
    SigningFailed,
}

/// A 64-byte BIP-340 Schnorr signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    /// Wrap raw signature bytes. No validation happens until verification.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a signature from a byte slice of exactly 64 bytes.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, SignatureError> {
        let bytes: [u8; SIGNATURE_LENGTH] = slice
            .try_into()
            .map_err(|_| SignatureError::InvalidSignatureBytes)?;
        Ok(Self(bytes))
    }

    /// Parse a 128-character hex signature.
    pub fn from_hex(hex_str: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(hex_str).map_err(|_| SignatureError::InvalidSignatureBytes)?;
        Self::try_from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

/// Sign a 32-byte digest with the keypair's secret scalar.
///
/// # Example
///
/// ```
/// use parcel_protocol::crypto::{sha256, sign_digest, verify_digest, Keypair};
///
/// let keypair = Keypair::generate();
/// let digest = sha256(b"redeem proof 42");
/// let signature = sign_digest(&keypair, &digest).unwrap();
///
/// assert!(verify_digest(&keypair.public_key(), &digest, &signature).is_ok());
/// ```
pub fn sign_digest(
    keypair: &Keypair,
    digest: &[u8; DIGEST_LENGTH],
) -> Result<Signature, SignatureError> {
    let mut aux_rand = [0u8; 32];
    OsRng.fill_bytes(&mut aux_rand);

    let signature = keypair
        .signing_key()
        .sign_raw(digest, &aux_rand)
        .map_err(|_| SignatureError::SigningFailed)?;

    Ok(Signature(signature.to_bytes()))
}

/// Verify a BIP-340 signature over a 32-byte digest.
///
/// The key is checked in its x-only form, so either parity of the same
/// point verifies.
pub fn verify_digest(
    public_key: &PublicKey,
    digest: &[u8; DIGEST_LENGTH],
    signature: &Signature,
) -> Result<(), SignatureError> {
    let verifying_key = public_key
        .verifying_key()
        .map_err(|_| SignatureError::InvalidPublicKey)?;

    // Parsing rejects r >= p and s >= n before any curve math runs.
    let signature = SchnorrSignature::try_from(signature.as_bytes().as_slice())
        .map_err(|_| SignatureError::VerificationFailed)?;

    verifying_key
        .verify_raw(digest, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::sha256;

    #[test]
    fn sign_and_verify() {
        let kp = Keypair::generate();
        let digest = sha256(b"hello");
        let sig = sign_digest(&kp, &digest).unwrap();
        assert!(verify_digest(&kp.public_key(), &digest, &sig).is_ok());
    }

    #[test]
    fn wrong_key_fails() {
        let signer = Keypair::generate();
        let other = Keypair::generate();
        let digest = sha256(b"hello");
        let sig = sign_digest(&signer, &digest).unwrap();
        assert_eq!(
            verify_digest(&other.public_key(), &digest, &sig),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn wrong_digest_fails() {
        let kp = Keypair::generate();
        let sig = sign_digest(&kp, &sha256(b"hello")).unwrap();
        assert!(verify_digest(&kp.public_key(), &sha256(b"hellp"), &sig).is_err());
    }

    #[test]
    fn flipped_signature_bit_fails() {
        let kp = Keypair::generate();
        let digest = sha256(b"hello");
        let sig = sign_digest(&kp, &digest).unwrap();

        for byte in [0usize, 31, 32, 63] {
            let mut bytes = *sig.as_bytes();
            bytes[byte] ^= 0x01;
            let tampered = Signature::from_bytes(bytes);
            assert!(verify_digest(&kp.public_key(), &digest, &tampered).is_err());
        }
    }

    #[test]
    fn signatures_are_randomized() {
        let kp = Keypair::generate();
        let digest = sha256(b"same digest");
        let a = sign_digest(&kp, &digest).unwrap();
        let b = sign_digest(&kp, &digest).unwrap();
        assert_ne!(a, b);
        assert!(verify_digest(&kp.public_key(), &digest, &a).is_ok());
        assert!(verify_digest(&kp.public_key(), &digest, &b).is_ok());
    }

    #[test]
    fn hex_roundtrip_and_length_check() {
        let kp = Keypair::generate();
        let sig = sign_digest(&kp, &sha256(b"x")).unwrap();
        assert_eq!(Signature::from_hex(&sig.to_hex()).unwrap(), sig);
        assert_eq!(
            Signature::from_hex("abcd"),
            Err(SignatureError::InvalidSignatureBytes)
        );
    }
}
