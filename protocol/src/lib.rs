// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PARCEL Protocol: Core Library
//!
//! Two small protocols for moving messages and value between people who
//! only know each other's public keys.
//!
//! 1. **Direct messages over relays.** Encrypt to the recipient's key,
//!    wrap in a signed event, push to a handful of independent relays,
//!    and let the recipient pull it back out.
//! 2. **Locked tokens.** A mint issues a proof pinned to a public key;
//!    only a signature under that key gets it redeemed, and only once.
//!
//! Both run on secp256k1, because that is the curve the relay network
//! and the token ecosystem already speak.
//!
//! ## Architecture
//!
//! - **crypto**: keys, Schnorr signatures, ECDH + AES envelopes, hashing.
//! - **identity**: `npub` / `nsec` text encodings of keys.
//! - **event**: signed, content-addressed events.
//! - **relay**: publish/subscribe across many relays, over WebSockets or
//!   in-process.
//! - **messaging**: the direct-message flow composed from the above.
//! - **token**: locked proofs, the redemption protocol, the issuing
//!   authority.
//! - **config**: protocol constants and gateway configuration.
//!
//! ## Design Philosophy
//!
//! 1. Crypto is synchronous and pure. Only relay I/O is async.
//! 2. Validate at the boundary. Past a parser, types are trusted.
//! 3. Relays are unreliable by nature; partial success is success.
//! 4. If it touches keys or value, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod event;
pub mod identity;
pub mod messaging;
pub mod relay;
pub mod token;
