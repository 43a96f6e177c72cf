//! # Envelope Encryption
//!
//! Encrypts direct-message payloads between two key holders.
//!
//! ## Key agreement
//!
//! Each side runs secp256k1 ECDH with its own secret and the other side's
//! public key. The 32-byte x-coordinate of the shared point is the AES-256
//! key. ECDH is symmetric, so sender and recipient derive the same key
//! without ever transmitting it, and nobody stores it: it is re-derived for
//! every message and zeroized when dropped.
//!
//! ## Cipher and wire format
//!
//! AES-256-CBC with PKCS#7 padding and a fresh random 16-byte IV per
//! message, packed as text:
//!
//! ```text
//! base64(ciphertext) "?iv=" base64(iv)
//! ```
//!
//! This is the format existing relay clients read and write.
//!
//! ## Integrity
//!
//! CBC is not authenticated. A wrong key or tampered ciphertext usually
//! shows up as bad padding or invalid UTF-8, but not always. The envelope
//! always travels inside a signed event, and
//! [`messaging`](crate::messaging) verifies that signature before it ever
//! calls [`decrypt`]. Call sites that decrypt bare blobs get no integrity
//! guarantee.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use k256::elliptic_curve::zeroize::Zeroize;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use super::keys::{KeyError, Keypair, PublicKey};
use crate::config::{AES_BLOCK_LENGTH, AES_KEY_LENGTH, ENVELOPE_IV_SEPARATOR};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Errors that can occur during encryption/decryption.
///
/// `DecryptionFailed` deliberately covers every decrypt-side failure.
/// Telling a caller *which* check failed is a padding oracle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- malformed envelope, wrong key, or corrupted ciphertext")]
    DecryptionFailed,

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Per-pair symmetric key. Zeroized on drop.
struct ConversationKey([u8; AES_KEY_LENGTH]);

impl ConversationKey {
    fn derive(own: &Keypair, counterparty: &PublicKey) -> Self {
        let shared = k256::ecdh::diffie_hellman(
            own.secret_key().to_nonzero_scalar(),
            counterparty.as_affine(),
        );
        let mut key = [0u8; AES_KEY_LENGTH];
        key.copy_from_slice(shared.raw_secret_bytes());
        Self(key)
    }
}

impl Drop for ConversationKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Encrypt `plaintext` from `sender` to `recipient`.
///
/// # Example
///
/// ```
/// use parcel_protocol::crypto::{encrypt, decrypt, Keypair};
///
/// let alice = Keypair::generate();
/// let bob = Keypair::generate();
///
/// let envelope = encrypt(&alice, &bob.public_key(), "hello").unwrap();
/// let opened = decrypt(&bob, &alice.public_key(), &envelope).unwrap();
/// assert_eq!(opened, "hello");
/// ```
pub fn encrypt(
    sender: &Keypair,
    recipient: &PublicKey,
    plaintext: &str,
) -> Result<String, EncryptionError> {
    let key = ConversationKey::derive(sender, recipient);

    let mut iv = [0u8; AES_BLOCK_LENGTH];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new_from_slices(&key.0, &iv)
        .map_err(|_| EncryptionError::EncryptFailed)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    Ok(format!(
        "{}{}{}",
        BASE64.encode(ciphertext),
        ENVELOPE_IV_SEPARATOR,
        BASE64.encode(iv)
    ))
}

/// Decrypt an envelope that `sender` encrypted for `receiver`.
///
/// The envelope shape is checked before any key agreement runs.
pub fn decrypt(
    receiver: &Keypair,
    sender: &PublicKey,
    envelope: &str,
) -> Result<String, EncryptionError> {
    let (ciphertext, iv) = split_envelope(envelope)?;
    let key = ConversationKey::derive(receiver, sender);

    let plaintext = Aes256CbcDec::new_from_slices(&key.0, &iv)
        .map_err(|_| EncryptionError::DecryptionFailed)?
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| EncryptionError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| EncryptionError::DecryptionFailed)
}

/// Split and decode `base64(ct)?iv=base64(iv)`.
fn split_envelope(envelope: &str) -> Result<(Vec<u8>, [u8; AES_BLOCK_LENGTH]), EncryptionError> {
    let (ct_b64, iv_b64) = envelope
        .split_once(ENVELOPE_IV_SEPARATOR)
        .ok_or(EncryptionError::DecryptionFailed)?;

    let ciphertext = BASE64
        .decode(ct_b64)
        .map_err(|_| EncryptionError::DecryptionFailed)?;
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_LENGTH != 0 {
        return Err(EncryptionError::DecryptionFailed);
    }

    let iv: [u8; AES_BLOCK_LENGTH] = BASE64
        .decode(iv_b64)
        .map_err(|_| EncryptionError::DecryptionFailed)?
        .try_into()
        .map_err(|_| EncryptionError::DecryptionFailed)?;

    Ok((ciphertext, iv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_both_directions() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        let a_to_b = encrypt(&alice, &bob.public_key(), "hi bob").unwrap();
        assert_eq!(decrypt(&bob, &alice.public_key(), &a_to_b).unwrap(), "hi bob");

        let b_to_a = encrypt(&bob, &alice.public_key(), "hi alice").unwrap();
        assert_eq!(
            decrypt(&alice, &bob.public_key(), &b_to_a).unwrap(),
            "hi alice"
        );
    }

    #[test]
    fn key_agreement_is_symmetric() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let ab = ConversationKey::derive(&alice, &bob.public_key());
        let ba = ConversationKey::derive(&bob, &alice.public_key());
        assert_eq!(ab.0, ba.0);
    }

    #[test]
    fn x_only_lift_derives_same_key() {
        // Relays only carry x-only keys; the lifted point may have the other
        // parity, which must not change the shared x-coordinate.
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let bob_lifted = PublicKey::from_x_only(&bob.public_key().to_x_only()).unwrap();
        let direct = ConversationKey::derive(&alice, &bob.public_key());
        let lifted = ConversationKey::derive(&alice, &bob_lifted);
        assert_eq!(direct.0, lifted.0);
    }

    #[test]
    fn envelope_has_expected_shape() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let envelope = encrypt(&alice, &bob.public_key(), "exactly sixteen!").unwrap();
        let (ct, iv) = split_envelope(&envelope).unwrap();
        // 16 bytes of plaintext pad out to a second full block.
        assert_eq!(ct.len(), 32);
        assert_eq!(iv.len(), AES_BLOCK_LENGTH);
    }

    #[test]
    fn fresh_iv_per_message() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let first = encrypt(&alice, &bob.public_key(), "same").unwrap();
        let second = encrypt(&alice, &bob.public_key(), "same").unwrap();
        assert_ne!(first, second);
        assert_ne!(
            first.split_once(ENVELOPE_IV_SEPARATOR).unwrap().1,
            second.split_once(ENVELOPE_IV_SEPARATOR).unwrap().1
        );
    }

    #[test]
    fn empty_and_unicode_plaintexts() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        for text in ["", "olá, 世界 🌍"] {
            let envelope = encrypt(&alice, &bob.public_key(), text).unwrap();
            assert_eq!(decrypt(&bob, &alice.public_key(), &envelope).unwrap(), text);
        }
    }

    #[test]
    fn third_party_cannot_read() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let carol = Keypair::generate();

        let envelope = encrypt(&alice, &bob.public_key(), "hello").unwrap();
        match decrypt(&carol, &alice.public_key(), &envelope) {
            Ok(text) => assert_ne!(text, "hello"),
            Err(e) => assert_eq!(e, EncryptionError::DecryptionFailed),
        }
    }

    #[test]
    fn malformed_envelopes_are_rejected() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();
        let good = encrypt(&alice, &bob.public_key(), "hello").unwrap();
        let (ct, iv) = good.split_once(ENVELOPE_IV_SEPARATOR).unwrap();

        let cases = [
            ct.to_string(),                                   // no IV part
            format!("{}?iv=", ct),                            // empty IV
            format!("{}?iv={}", ct, BASE64.encode([0u8; 8])), // short IV
            format!("!!!?iv={}", iv),                         // bad base64
            format!("{}?iv={}", BASE64.encode([1u8; 5]), iv), // partial block
            format!("?iv={}", iv),                            // empty ciphertext
        ];

        for case in cases {
            assert_eq!(
                decrypt(&bob, &alice.public_key(), &case),
                Err(EncryptionError::DecryptionFailed),
                "accepted malformed envelope {case:?}"
            );
        }
    }
}
