//! Event construction via the builder pattern.
//!
//! [`EventBuilder`] collects kind, tags, content and timestamp, then
//! `.sign()` fixes them all at once: compute the canonical id, sign it,
//! hand back an immutable [`SignedEvent`]. There is no "unsigned event"
//! value floating around in between, so an id can never go stale.

use chrono::Utc;
use tracing::debug;

use super::types::{compute_id, SignedEvent, Tag};
use super::verification::EventError;
use crate::crypto::keys::Keypair;
use crate::crypto::signatures::sign_digest;

/// Fluent builder for [`SignedEvent`].
///
/// ```
/// use parcel_protocol::crypto::Keypair;
/// use parcel_protocol::event::{EventBuilder, Tag};
///
/// let alice = Keypair::generate();
/// let bob = Keypair::generate();
///
/// let event = EventBuilder::new(4)
///     .tag(Tag::pubkey(&bob.public_key()))
///     .content("ciphertext?iv=...")
///     .sign(&alice)
///     .unwrap();
///
/// assert!(event.is_valid());
/// ```
#[derive(Debug, Clone)]
pub struct EventBuilder {
    kind: u16,
    tags: Vec<Tag>,
    content: String,
    created_at: Option<u64>,
}

impl EventBuilder {
    pub fn new(kind: u16) -> Self {
        Self {
            kind,
            tags: Vec::new(),
            content: String::new(),
            created_at: None,
        }
    }

    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Pin the timestamp. Defaults to "now" at signing time.
    pub fn created_at(mut self, unix_seconds: u64) -> Self {
        self.created_at = Some(unix_seconds);
        self
    }

    /// Compute the id, sign it, and return the finished event.
    pub fn sign(self, keys: &Keypair) -> Result<SignedEvent, EventError> {
        let created_at = self.created_at.unwrap_or_else(now);
        build(keys, self.kind, self.tags, self.content, created_at)
    }
}

/// Build and sign an event in one call.
pub fn build(
    keys: &Keypair,
    kind: u16,
    tags: Vec<Tag>,
    content: impl Into<String>,
    created_at: u64,
) -> Result<SignedEvent, EventError> {
    let content = content.into();
    let pubkey = keys.public_key().to_hex();

    let id = compute_id(&pubkey, created_at, kind, &tags, &content)?;
    let sig = sign_digest(keys, &id)?;

    let event = SignedEvent {
        id: hex::encode(id),
        pubkey,
        created_at,
        kind,
        tags,
        content,
        sig: sig.to_hex(),
    };
    debug!(id = %event.id, kind, "event signed");
    Ok(event)
}

fn now() -> u64 {
    // Clamp pre-epoch clocks to zero rather than wrapping.
    Utc::now().timestamp().max(0) as u64
}
