//! # Signed Events
//!
//! The record format everything on a relay travels in. An event is a small
//! JSON object whose `id` is the hash of its own contents and whose `sig`
//! is a Schnorr signature over that id.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        Tag, SignedEvent, canonical serialization
//! builder.rs      EventBuilder and the one-shot build()
//! verification.rs verify() and EventError
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build**: [`EventBuilder`] (or [`build`]) fixes all fields, computes
//!    the id and signs it.
//! 2. **Publish**: the gateway ships the JSON as-is.
//! 3. **Verify**: every receiver runs [`verify`] before trusting a single
//!    byte of it.
//!
//! ## Canonical id
//!
//! `id = SHA-256([0, pubkey, created_at, kind, tags, content])`, serialized
//! as compact JSON. The format has to match byte-for-byte across every
//! client on the network, so it is not ours to improve.

pub mod builder;
pub mod types;
pub mod verification;

pub use builder::{build, EventBuilder};
pub use types::{SignedEvent, Tag};
pub use verification::{verify, EventError};
