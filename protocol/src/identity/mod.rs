//! # Identity Module
//!
//! The human side of PARCEL keys. A participant is one secp256k1 keypair
//! (see [`crypto::keys`](crate::crypto::keys)); this module turns it into
//! the text people exchange:
//!
//! 1. **npub**: bech32-encoded x-only public key. This is what users share
//!    and paste into "recipient" fields.
//! 2. **nsec**: bech32-encoded secret scalar, for deliberate export and
//!    backup.
//!
//! Input fields also accept raw hex, see [`PublicKey::parse`].
//!
//! ## Design Decisions
//!
//! - Bech32 (not Bech32m). The relay ecosystem settled on it years ago
//!   and its error detection is plenty for 32-byte payloads.
//! - Prefix, length, and charset are validated before the checksum, so
//!   garbage input is rejected without doing polynomial arithmetic on it.

pub mod encoding;

pub use crate::crypto::keys::{Keypair, PublicKey};
pub use encoding::{decode, decode_public, decode_secret, encode_public, encode_secret, DecodedKey};
