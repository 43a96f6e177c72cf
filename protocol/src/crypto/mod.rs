//! # Cryptographic Primitives for PARCEL
//!
//! This module is the foundation of everything security-related in the
//! protocol. Every signature, every event id and every encrypted payload
//! flows through here.
//!
//! - **secp256k1** keys, because that is the curve the relay network and
//!   the token ecosystem already speak.
//! - **BIP-340 Schnorr** for signatures over 32-byte digests.
//! - **ECDH + AES-256-CBC** for message envelopes.
//! - **SHA-256** for content addressing.
//!
//! Everything here is synchronous and touches no shared state, so any
//! number of threads can call into it without coordination.

pub mod encryption;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use encryption::{decrypt, encrypt, EncryptionError};
pub use hash::{sha256, sha256_hex};
pub use keys::{KeyError, Keypair, PublicKey};
pub use signatures::{sign_digest, verify_digest, Signature, SignatureError};
