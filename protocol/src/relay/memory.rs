//! In-process relays.
//!
//! A [`MemoryRelay`] behaves like a small, honest relay: it verifies every
//! event it is sent (answering `OK false` for bad ones), stores the good
//! ones, serves backfill newest-first honouring `limit`, sends `EOSE`, and
//! then streams live events to open subscriptions. A [`MemoryConnector`]
//! maps URLs to relays; URLs it does not know are unreachable.
//!
//! Used by the integration tests, the demo, and anyone
//! who wants the full publish/subscribe path without a network.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::connection::{RelayConnection, RelayConnector, RelayError};
use super::filter::Filter;
use super::message::{ClientMessage, RelayMessage};
use crate::config::MEMORY_RELAY_BROADCAST_CAPACITY;
use crate::event::{self, SignedEvent};

// ---------------------------------------------------------------------------
// MemoryRelay
// ---------------------------------------------------------------------------

/// A relay that lives in this process. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryRelay {
    inner: Arc<RelayState>,
}

struct RelayState {
    url: String,
    events: RwLock<Vec<SignedEvent>>,
    seen: RwLock<HashSet<String>>,
    live: broadcast::Sender<SignedEvent>,
}

/// What the relay did with a submitted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Stored,
    Duplicate,
    Invalid(String),
}

impl MemoryRelay {
    pub fn new(url: impl Into<String>) -> Self {
        let (live, _) = broadcast::channel(MEMORY_RELAY_BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(RelayState {
                url: url.into(),
                events: RwLock::new(Vec::new()),
                seen: RwLock::new(HashSet::new()),
                live,
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Snapshot of stored events in arrival order.
    pub fn events(&self) -> Vec<SignedEvent> {
        self.inner.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verify and store an event, fanning it out to live subscribers.
    pub fn admit(&self, event: SignedEvent) -> Admission {
        if let Err(e) = event::verify(&event) {
            debug!(relay = %self.inner.url, id = %event.id(), "rejecting invalid event");
            return Admission::Invalid(e.to_string());
        }
        if !self.inner.seen.write().insert(event.id().to_string()) {
            return Admission::Duplicate;
        }

        self.inner.events.write().push(event.clone());
        // No receivers is fine: nobody is subscribed yet.
        let _ = self.inner.live.send(event);
        Admission::Stored
    }

    /// Stored events matching `filter`, newest first, capped by `limit`.
    pub fn backfill(&self, filter: &Filter) -> Vec<SignedEvent> {
        let events = self.inner.events.read();
        let mut matching: Vec<SignedEvent> =
            events.iter().filter(|e| filter.matches(e)).cloned().collect();
        // Stable sort keeps arrival order among equal timestamps; reverse
        // puts the most recent arrival first.
        matching.sort_by_key(|e| e.created_at());
        matching.reverse();
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        matching
    }

    fn subscribe_live(&self) -> broadcast::Receiver<SignedEvent> {
        self.inner.live.subscribe()
    }
}

impl std::fmt::Debug for MemoryRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRelay")
            .field("url", &self.inner.url)
            .field("events", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MemoryConnector
// ---------------------------------------------------------------------------

/// URL -> [`MemoryRelay`] directory. Clones share the directory.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    relays: Arc<DashMap<String, MemoryRelay>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector with a fresh relay registered at each URL.
    pub fn with_relays<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let connector = Self::new();
        for url in urls {
            connector.add_relay(MemoryRelay::new(url));
        }
        connector
    }

    pub fn add_relay(&self, relay: MemoryRelay) {
        self.relays.insert(relay.url().to_string(), relay);
    }

    /// Unregister a relay. Open connections keep working; new ones fail.
    pub fn remove_relay(&self, url: &str) -> Option<MemoryRelay> {
        self.relays.remove(url).map(|(_, relay)| relay)
    }

    pub fn relay(&self, url: &str) -> Option<MemoryRelay> {
        self.relays.get(url).map(|r| r.clone())
    }
}

impl std::fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("relays", &self.relays.len())
            .finish()
    }
}

#[async_trait]
impl RelayConnector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelayConnection>, RelayError> {
        let relay = self.relay(url).ok_or_else(|| RelayError::Unreachable {
            url: url.to_string(),
            reason: "no such relay".into(),
        })?;
        let live = relay.subscribe_live();

        Ok(Box::new(MemoryConnection {
            relay,
            live,
            pending: VecDeque::new(),
            subscriptions: HashMap::new(),
            open: true,
        }))
    }
}

// ---------------------------------------------------------------------------
// MemoryConnection
// ---------------------------------------------------------------------------

struct MemoryConnection {
    relay: MemoryRelay,
    live: broadcast::Receiver<SignedEvent>,
    pending: VecDeque<RelayMessage>,
    subscriptions: HashMap<String, Vec<Filter>>,
    open: bool,
}

impl MemoryConnection {
    fn handle_event(&mut self, event: SignedEvent) {
        let event_id = event.id().to_string();
        let (accepted, message) = match self.relay.admit(event) {
            Admission::Stored => (true, String::new()),
            Admission::Duplicate => (true, "duplicate: already have this event".to_string()),
            Admission::Invalid(reason) => (false, format!("invalid: {reason}")),
        };
        self.pending.push_back(RelayMessage::Ok {
            event_id,
            accepted,
            message,
        });
    }

    fn handle_req(&mut self, subscription_id: String, filters: Vec<Filter>) {
        if self.subscriptions.is_empty() {
            // Start the live feed now so events that arrived before the
            // REQ are served once, by backfill.
            self.live = self.relay.subscribe_live();
        }

        let mut sent = HashSet::new();
        for filter in &filters {
            for event in self.relay.backfill(filter) {
                if sent.insert(event.id().to_string()) {
                    self.pending.push_back(RelayMessage::Event {
                        subscription_id: subscription_id.clone(),
                        event,
                    });
                }
            }
        }
        self.pending.push_back(RelayMessage::Eose(subscription_id.clone()));
        self.subscriptions.insert(subscription_id, filters);
    }

    fn fan_out(&mut self, event: &SignedEvent) {
        for (id, filters) in &self.subscriptions {
            if filters.iter().any(|f| f.matches(event)) {
                self.pending.push_back(RelayMessage::Event {
                    subscription_id: id.clone(),
                    event: event.clone(),
                });
            }
        }
    }
}

#[async_trait]
impl RelayConnection for MemoryConnection {
    fn url(&self) -> &str {
        self.relay.url()
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), RelayError> {
        if !self.open {
            return Err(RelayError::Closed);
        }
        match message.clone() {
            ClientMessage::Event(event) => self.handle_event(event),
            ClientMessage::Req {
                subscription_id,
                filters,
            } => self.handle_req(subscription_id, filters),
            ClientMessage::Close(id) => {
                self.subscriptions.remove(&id);
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<RelayMessage, RelayError> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }
            if !self.open {
                return Err(RelayError::Closed);
            }
            match self.live.recv().await {
                Ok(event) => self.fan_out(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(relay = %self.relay.url(), skipped, "live feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(RelayError::Closed),
            }
        }
    }

    async fn close(&mut self) {
        self.open = false;
        self.subscriptions.clear();
        self.pending.clear();
    }
}
