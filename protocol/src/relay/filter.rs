//! Subscription filters.
//!
//! A filter is a conjunction: an event matches when it passes every
//! constraint that is present. Absent constraints match anything. Within a
//! list (`kinds`, `authors`, `#p`, ...) any one entry is enough.

use serde::{Deserialize, Serialize};

use crate::config::PUBKEY_TAG;
use crate::crypto::keys::PublicKey;
use crate::event::SignedEvent;

/// Relay subscription filter, serialized the way relays expect it:
/// `{ "ids", "authors", "kinds", "#p", "since", "until", "limit" }`.
///
/// `limit` only caps the historical backfill a relay sends before `EOSE`.
/// It is not a match criterion and never truncates live delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,

    /// Hex keys that must appear in a `p` tag.
    #[serde(rename = "#p", default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kinds.get_or_insert_with(Vec::new).push(kind);
        self
    }

    pub fn author(mut self, key: &PublicKey) -> Self {
        self.authors.get_or_insert_with(Vec::new).push(key.to_hex());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.ids.get_or_insert_with(Vec::new).push(id.into());
        self
    }

    /// Require a `p` tag naming `key`.
    pub fn recipient(mut self, key: &PublicKey) -> Self {
        self.recipients.get_or_insert_with(Vec::new).push(key.to_hex());
        self
    }

    pub fn since(mut self, unix_seconds: u64) -> Self {
        self.since = Some(unix_seconds);
        self
    }

    pub fn until(mut self, unix_seconds: u64) -> Self {
        self.until = Some(unix_seconds);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Does `event` satisfy every present constraint?
    pub fn matches(&self, event: &SignedEvent) -> bool {
        fn allowed(list: &Option<Vec<String>>, value: &str) -> bool {
            list.as_ref().map_or(true, |l| l.iter().any(|v| v == value))
        }

        if !allowed(&self.ids, event.id())
            || !allowed(&self.authors, event.pubkey())
            || !self.kinds.as_ref().map_or(true, |k| k.contains(&event.kind()))
        {
            return false;
        }

        if let Some(wanted) = &self.recipients {
            let tagged = event
                .tag_values(PUBKEY_TAG)
                .any(|v| wanted.iter().any(|w| w == v));
            if !tagged {
                return false;
            }
        }

        let ts = event.created_at();
        self.since.map_or(true, |s| ts >= s) && self.until.map_or(true, |u| ts <= u)
    }
}
