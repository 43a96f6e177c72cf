//! # Direct Messaging
//!
//! Encrypted one-to-one messages over relays, composed from the pieces
//! below it:
//!
//! ```text
//! send:   plaintext --encrypt--> envelope --build(kind 4, ["p", to])--> event --publish--> relays
//! inbox:  relays --subscribe(kinds [4], #p [me])--> event --verify--> dedup --decrypt--> DirectMessage
//! ```
//!
//! The [`Messenger`] owns a keypair and borrows an injected
//! [`RelayGateway`]. Verification happens before decryption on every
//! inbound event, which is what gives the unauthenticated envelope its
//! integrity: an attacker who flips ciphertext bits also breaks the
//! event signature, and the event is dropped before anything is
//! decrypted.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DIRECT_MESSAGE_KIND;
use crate::crypto::encryption::{self, EncryptionError};
use crate::crypto::keys::{Keypair, PublicKey};
use crate::event::{self, EventBuilder, EventError, SignedEvent, Tag};
use crate::relay::{Filter, PublishReport, RelayGateway, Subscription, SubscriptionHandle};

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Event(#[from] EventError),
}

/// A decrypted, verified message addressed to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMessage {
    /// Id of the carrying event.
    pub id: String,
    pub from: PublicKey,
    pub content: String,
    pub created_at: u64,
}

/// What `send` produced: the event that went out and how each relay took it.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub event: SignedEvent,
    pub report: PublishReport,
}

/// Sends and receives direct messages as one identity.
#[derive(Debug, Clone)]
pub struct Messenger {
    keys: Keypair,
    gateway: Arc<RelayGateway>,
}

impl Messenger {
    pub fn new(keys: Keypair, gateway: Arc<RelayGateway>) -> Self {
        Self { keys, gateway }
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    pub fn gateway(&self) -> &RelayGateway {
        &self.gateway
    }

    /// Build the signed event carrying `text` to `recipient`, without
    /// publishing it.
    pub fn seal(&self, recipient: &PublicKey, text: &str) -> Result<SignedEvent, MessagingError> {
        let envelope = encryption::encrypt(&self.keys, recipient, text)?;
        let event = EventBuilder::new(DIRECT_MESSAGE_KIND)
            .tag(Tag::pubkey(recipient))
            .content(envelope)
            .sign(&self.keys)?;
        Ok(event)
    }

    /// Encrypt, sign and publish.
    ///
    /// Succeeds even if no relay accepted the event; check
    /// [`PublishReport::is_undelivered`].
    pub async fn send(&self, recipient: &PublicKey, text: &str) -> Result<SentMessage, MessagingError> {
        let event = self.seal(recipient, text)?;
        let report = self.gateway.publish(&event).await;
        info!(
            id = %event.id(),
            to = %recipient,
            accepted = report.successes(),
            "direct message sent"
        );
        Ok(SentMessage { event, report })
    }

    /// Subscribe to messages addressed to us. `limit` caps backfill per relay.
    pub fn inbox(&self, limit: Option<usize>) -> Inbox {
        let mut filter = Filter::new()
            .kind(DIRECT_MESSAGE_KIND)
            .recipient(&self.keys.public_key());
        filter.limit = limit;

        Inbox {
            keys: self.keys.clone(),
            subscription: self.gateway.subscribe(filter),
            seen: HashSet::new(),
        }
    }

    /// Verify and decrypt one event addressed to us.
    pub fn open(&self, event: &SignedEvent) -> Result<DirectMessage, MessagingError> {
        open(&self.keys, event)
    }
}

/// Stream of verified, de-duplicated, decrypted messages.
#[derive(Debug)]
pub struct Inbox {
    keys: Keypair,
    subscription: Subscription,
    seen: HashSet<String>,
}

impl Inbox {
    /// Next message. Events that fail verification or decryption are
    /// dropped with a warning. `None` once cancelled or every relay is gone.
    pub async fn next(&mut self) -> Option<DirectMessage> {
        while let Some(delivery) = self.subscription.recv().await {
            let event = delivery.event;
            if self.seen.contains(event.id()) {
                debug!(id = %event.id(), relay = %delivery.relay, "duplicate delivery");
                continue;
            }

            match open(&self.keys, &event) {
                Ok(message) => {
                    self.seen.insert(message.id.clone());
                    return Some(message);
                }
                Err(e) => {
                    warn!(id = %event.id(), relay = %delivery.relay, error = %e, "dropping inbound event");
                    // A forged copy must not shadow a genuine one under
                    // the same id, so failures are not recorded as seen.
                }
            }
        }
        None
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.subscription.handle()
    }

    pub fn cancel(&self) {
        self.subscription.cancel();
    }
}

fn open(keys: &Keypair, event: &SignedEvent) -> Result<DirectMessage, MessagingError> {
    event::verify(event)?;
    if event.kind() != DIRECT_MESSAGE_KIND {
        return Err(EventError::InvalidEvent(format!("unexpected kind {}", event.kind())).into());
    }
    let me = keys.public_key().to_hex();
    if !event.recipients().any(|r| r == me) {
        return Err(EventError::InvalidEvent("not addressed to us".into()).into());
    }

    let from = event.author()?;
    let content = encryption::decrypt(keys, &from, event.content())?;
    Ok(DirectMessage {
        id: event.id().to_string(),
        from,
        content,
        created_at: event.created_at(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::relay::MemoryConnector;
    use std::time::Duration;

    fn messenger(connector: &MemoryConnector, relays: &[&str]) -> Messenger {
        let gateway = RelayGateway::new(
            connector.clone(),
            GatewayConfig::with_relays(relays.iter().copied()),
        );
        Messenger::new(Keypair::generate(), Arc::new(gateway))
    }

    #[test]
    fn sealed_event_opens_for_recipient_only() {
        let connector = MemoryConnector::new();
        let alice = messenger(&connector, &[]);
        let bob = messenger(&connector, &[]);
        let carol = messenger(&connector, &[]);

        let event = alice.seal(&bob.public_key(), "hello").unwrap();
        assert_eq!(event.kind(), DIRECT_MESSAGE_KIND);
        assert!(!event.content().contains("hello"));

        let opened = bob.open(&event).unwrap();
        assert_eq!(opened.content, "hello");
        assert_eq!(opened.from, alice.public_key());
        assert!(carol.open(&event).is_err());
    }

    #[test]
    fn tampered_ciphertext_is_rejected_before_decrypt() {
        let connector = MemoryConnector::new();
        let alice = messenger(&connector, &[]);
        let bob = messenger(&connector, &[]);

        let mut event = alice.seal(&bob.public_key(), "hello").unwrap();
        let first = event.content.remove(0);
        event.content.insert(0, if first == 'A' { 'B' } else { 'A' });
        assert!(matches!(bob.open(&event), Err(MessagingError::Event(_))));
    }

    #[tokio::test]
    async fn inbox_dedups_across_relays() {
        let relays = ["mem://a", "mem://b", "mem://c"];
        let connector = MemoryConnector::with_relays(relays);
        let alice = messenger(&connector, &relays);
        let bob = messenger(&connector, &relays);

        let sent = alice.send(&bob.public_key(), "first").await.unwrap();
        assert_eq!(sent.report.successes(), 3);
        alice.send(&bob.public_key(), "second").await.unwrap();

        let mut inbox = bob.inbox(None);
        let mut got = Vec::new();
        for _ in 0..2 {
            let msg = tokio::time::timeout(Duration::from_secs(2), inbox.next())
                .await
                .unwrap()
                .unwrap();
            got.push(msg.content);
        }
        got.sort();
        assert_eq!(got, vec!["first", "second"]);

        // Every relay held a copy of both; nothing else is pending.
        let extra = tokio::time::timeout(Duration::from_millis(200), inbox.next()).await;
        assert!(extra.is_err());
    }
}
