//! Event value types: tags and the signed event itself.
//!
//! A [`SignedEvent`] has no public setters. Its fields are fixed by the
//! builder, the `id` and `sig` are derived from them, and everyone
//! downstream only gets read access. The one way in from the outside is
//! deserialization, which is exactly why [`super::verify`] exists.

use serde::{Deserialize, Serialize};

use super::verification::EventError;
use crate::config::{PUBKEY_TAG, X_ONLY_KEY_LENGTH};
use crate::crypto::hash::{sha256, DIGEST_LENGTH};
use crate::crypto::keys::PublicKey;

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// One tag: a non-empty list of strings whose first entry is the tag name.
///
/// On the wire a tag is a bare JSON array, e.g. `["p", "<hex pubkey>"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(Vec<String>);

impl Tag {
    /// Build a tag from its name and values.
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields = vec![name.into()];
        fields.extend(values.into_iter().map(Into::into));
        Self(fields)
    }

    /// A recipient tag: `["p", <x-only hex>]`.
    pub fn pubkey(key: &PublicKey) -> Self {
        Self::new(PUBKEY_TAG, [key.to_hex()])
    }

    /// Tag name, or `""` for a degenerate empty tag received off the wire.
    pub fn name(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    /// The first value after the name, if any.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for Tag {
    fn from(fields: Vec<String>) -> Self {
        Self(fields)
    }
}

// ---------------------------------------------------------------------------
// Canonical form
// ---------------------------------------------------------------------------

/// Serialize the id preimage: the compact JSON array
/// `[0, pubkey, created_at, kind, tags, content]`.
///
/// serde_json escapes exactly the characters the relay network expects
/// (`"`, `\`, and control characters) and never pretty-prints, so two
/// implementations given the same fields emit the same bytes.
pub(crate) fn canonical_bytes(
    pubkey: &str,
    created_at: u64,
    kind: u16,
    tags: &[Tag],
    content: &str,
) -> Result<Vec<u8>, EventError> {
    serde_json::to_vec(&(0u8, pubkey, created_at, kind, tags, content))
        .map_err(|e| EventError::Serialization(e.to_string()))
}

/// `SHA-256` of [`canonical_bytes`].
pub(crate) fn compute_id(
    pubkey: &str,
    created_at: u64,
    kind: u16,
    tags: &[Tag],
    content: &str,
) -> Result<[u8; DIGEST_LENGTH], EventError> {
    canonical_bytes(pubkey, created_at, kind, tags, content).map(|bytes| sha256(&bytes))
}

// ---------------------------------------------------------------------------
// SignedEvent
// ---------------------------------------------------------------------------

/// A signed, content-addressed event.
///
/// Wire shape: `{ id, pubkey, created_at, kind, tags, content, sig }` with
/// `id` (32 bytes), `pubkey` (32-byte x-only key) and `sig` (64 bytes) as
/// lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignedEvent {
    pub(crate) id: String,
    pub(crate) pubkey: String,
    pub(crate) created_at: u64,
    pub(crate) kind: u16,
    pub(crate) tags: Vec<Tag>,
    pub(crate) content: String,
    pub(crate) sig: String,
}

impl SignedEvent {
    /// Hex event id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Hex x-only author key, exactly as carried on the wire.
    pub fn pubkey(&self) -> &str {
        &self.pubkey
    }

    /// The author key, parsed. Only the canonical 64-char lowercase x-only
    /// form is accepted; anything else, or an off-curve key, fails.
    pub fn author(&self) -> Result<PublicKey, EventError> {
        if !is_lower_hex(&self.pubkey, X_ONLY_KEY_LENGTH) {
            return Err(EventError::InvalidEvent(
                "author key is not 64 lowercase hex chars".into(),
            ));
        }
        let bytes = hex::decode(&self.pubkey)
            .map_err(|_| EventError::InvalidEvent("author key is not hex".into()))?;
        PublicKey::from_x_only(&bytes)
            .map_err(|e| EventError::InvalidEvent(format!("author key: {e}")))
    }

    /// Unix seconds.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn kind(&self) -> u16 {
        self.kind
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Hex signature.
    pub fn sig(&self) -> &str {
        &self.sig
    }

    /// Values of every tag named `name`.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.name() == name)
            .filter_map(Tag::value)
    }

    /// Hex keys named in `p` tags.
    pub fn recipients(&self) -> impl Iterator<Item = &str> + '_ {
        self.tag_values(PUBKEY_TAG)
    }

    /// Run full verification and collapse the result to a bool.
    pub fn is_valid(&self) -> bool {
        super::verify(self).is_ok()
    }

    pub fn to_json(&self) -> Result<String, EventError> {
        serde_json::to_string(self).map_err(|e| EventError::Serialization(e.to_string()))
    }

    /// Parse from JSON. The result is NOT verified.
    pub fn from_json(json: &str) -> Result<Self, EventError> {
        serde_json::from_str(json).map_err(|e| EventError::Serialization(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// True when `s` is exactly `bytes` bytes of lowercase hex.
pub(crate) fn is_lower_hex(s: &str, bytes: usize) -> bool {
    s.len() == bytes * 2 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_is_compact_array() {
        let tags = vec![Tag::new("p", ["ab"])];
        let bytes = canonical_bytes("ff", 1_700_000_000, 4, &tags, "hi \"there\"\n").unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"[0,"ff",1700000000,4,[["p","ab"]],"hi \"there\"\n"]"#
        );
    }

    #[test]
    fn id_depends_on_every_field() {
        let tags = vec![Tag::new("p", ["ab"])];
        let base = compute_id("ff", 1, 4, &tags, "x").unwrap();
        assert_ne!(base, compute_id("fe", 1, 4, &tags, "x").unwrap());
        assert_ne!(base, compute_id("ff", 2, 4, &tags, "x").unwrap());
        assert_ne!(base, compute_id("ff", 1, 1, &tags, "x").unwrap());
        assert_ne!(base, compute_id("ff", 1, 4, &[], "x").unwrap());
        assert_ne!(base, compute_id("ff", 1, 4, &tags, "y").unwrap());
    }

    #[test]
    fn tag_accessors() {
        let tag = Tag::new("p", ["abc", "wss://relay"]);
        assert_eq!(tag.name(), "p");
        assert_eq!(tag.value(), Some("abc"));
        assert_eq!(tag.as_slice().len(), 3);

        let empty = Tag::from(Vec::new());
        assert_eq!(empty.name(), "");
        assert_eq!(empty.value(), None);
    }

    #[test]
    fn tag_serializes_as_bare_array() {
        let json = serde_json::to_string(&Tag::new("e", ["1"])).unwrap();
        assert_eq!(json, r#"["e","1"]"#);
    }
}
