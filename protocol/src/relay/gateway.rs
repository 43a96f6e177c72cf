//! # Relay Gateway
//!
//! Fan-out publishing and multi-relay subscriptions on top of a
//! [`RelayConnector`].
//!
//! ## Publishing
//!
//! Every relay gets its own attempt (connect, send `EVENT`, wait for the
//! matching `OK`), each bounded by the configured timeouts, all running
//! concurrently. The call returns once every attempt has resolved, and
//! returns a [`PublishReport`] rather than an error: some relays being
//! down is the normal state of the network, not a failure.
//!
//! ## Subscribing
//!
//! One task per relay. Each connects, sends `REQ`, and forwards matching
//! `EVENT` frames into a shared bounded channel until the subscription's
//! token is cancelled. A relay that fails to connect or drops mid-stream
//! just stops contributing; the others carry on.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::RngCore;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{RelayConnection, RelayConnector, RelayError};
use super::filter::Filter;
use super::message::{ClientMessage, RelayMessage};
use super::subscription::{RelayDelivery, Subscription};
use crate::config::GatewayConfig;
use crate::event::SignedEvent;

// ---------------------------------------------------------------------------
// PublishReport
// ---------------------------------------------------------------------------

/// Outcome of one relay's publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub relay: String,
    pub result: Result<(), RelayError>,
}

/// Per-relay outcomes of a publish, in the order the relays were given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub event_id: String,
    pub outcomes: Vec<RelayOutcome>,
}

impl PublishReport {
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }

    /// Relays that accepted the event.
    pub fn accepted_by(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.relay.as_str())
    }

    /// Relays that did not, with the reason.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &RelayError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.relay.as_str(), e)))
    }

    /// True when no relay took the event.
    pub fn is_undelivered(&self) -> bool {
        self.successes() == 0
    }
}

// ---------------------------------------------------------------------------
// RelayGateway
// ---------------------------------------------------------------------------

/// Explicit gateway instance. Construct one and inject it wherever events
/// need to go out or come in; there is no process-wide pool.
#[derive(Clone)]
pub struct RelayGateway {
    connector: Arc<dyn RelayConnector>,
    config: GatewayConfig,
}

impl RelayGateway {
    pub fn new<C>(connector: C, config: GatewayConfig) -> Self
    where
        C: RelayConnector + 'static,
    {
        Self::from_shared(Arc::new(connector), config)
    }

    pub fn from_shared(connector: Arc<dyn RelayConnector>, config: GatewayConfig) -> Self {
        Self { connector, config }
    }

    pub fn relays(&self) -> &[String] {
        &self.config.relays
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Publish to every configured relay.
    pub async fn publish(&self, event: &SignedEvent) -> PublishReport {
        self.publish_to(event, &self.config.relays).await
    }

    /// Publish to an explicit relay list.
    pub async fn publish_to(&self, event: &SignedEvent, relays: &[String]) -> PublishReport {
        let attempts = relays.iter().map(|url| async move {
            let result = self.publish_one(url, event).await;
            match &result {
                Ok(()) => debug!(relay = %url, id = %event.id(), "relay accepted event"),
                Err(e) => warn!(relay = %url, id = %event.id(), error = %e, "publish failed"),
            }
            RelayOutcome {
                relay: url.clone(),
                result,
            }
        });
        let outcomes = join_all(attempts).await;

        let report = PublishReport {
            event_id: event.id().to_string(),
            outcomes,
        };
        info!(
            id = %report.event_id,
            accepted = report.successes(),
            failed = report.failures(),
            "event published"
        );
        report
    }

    async fn publish_one(&self, url: &str, event: &SignedEvent) -> Result<(), RelayError> {
        let mut conn = connect_with_timeout(&*self.connector, url, self.config.connect_timeout())
            .await?;

        let publish_timeout = self.config.publish_timeout();
        let result = match timeout(publish_timeout, send_and_await_ok(&mut *conn, event)).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout {
                url: url.to_string(),
            }),
        };
        conn.close().await;
        result
    }

    /// Subscribe across every configured relay.
    ///
    /// Must be called from within a tokio runtime; one task is spawned per
    /// relay.
    pub fn subscribe(&self, filter: Filter) -> Subscription {
        let subscription_id = random_subscription_id();
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        for url in &self.config.relays {
            let task = RelayTask {
                connector: Arc::clone(&self.connector),
                url: url.clone(),
                subscription_id: subscription_id.clone(),
                filter: filter.clone(),
                tx: tx.clone(),
                token: token.clone(),
                connect_timeout: self.config.connect_timeout(),
            };
            tokio::spawn(task.run());
        }
        info!(
            sub = %subscription_id,
            relays = self.config.relays.len(),
            "subscription opened"
        );

        Subscription::new(subscription_id, rx, token)
    }
}

impl std::fmt::Debug for RelayGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayGateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn connect_with_timeout(
    connector: &dyn RelayConnector,
    url: &str,
    limit: Duration,
) -> Result<Box<dyn RelayConnection>, RelayError> {
    match timeout(limit, connector.connect(url)).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::Timeout {
            url: url.to_string(),
        }),
    }
}

async fn send_and_await_ok(
    conn: &mut dyn RelayConnection,
    event: &SignedEvent,
) -> Result<(), RelayError> {
    conn.send(&ClientMessage::Event(event.clone())).await?;
    loop {
        let frame = match conn.recv().await {
            Ok(frame) => frame,
            // Verbs we don't model (AUTH, COUNT, ...) are not transport
            // failures. Keep waiting for the OK.
            Err(RelayError::Protocol(reason)) => {
                debug!(relay = %conn.url(), reason = %reason, "skipping unrecognised frame");
                continue;
            }
            Err(e) => return Err(e),
        };
        match frame {
            RelayMessage::Ok {
                event_id,
                accepted,
                message,
            } if event_id == event.id() => {
                return if accepted {
                    Ok(())
                } else {
                    Err(RelayError::Rejected {
                        url: conn.url().to_string(),
                        reason: message,
                    })
                };
            }
            RelayMessage::Notice(notice) => {
                debug!(relay = %conn.url(), notice = %notice, "relay notice");
            }
            _ => continue,
        }
    }
}

fn random_subscription_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ---------------------------------------------------------------------------
// Per-relay subscription task
// ---------------------------------------------------------------------------

struct RelayTask {
    connector: Arc<dyn RelayConnector>,
    url: String,
    subscription_id: String,
    filter: Filter,
    tx: mpsc::Sender<RelayDelivery>,
    token: CancellationToken,
    connect_timeout: Duration,
}

impl RelayTask {
    async fn run(self) {
        let connect = connect_with_timeout(&*self.connector, &self.url, self.connect_timeout);
        let mut conn = tokio::select! {
            _ = self.token.cancelled() => return,
            result = connect => match result {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(relay = %self.url, sub = %self.subscription_id, error = %e, "subscription connect failed");
                    return;
                }
            },
        };

        let req = ClientMessage::Req {
            subscription_id: self.subscription_id.clone(),
            filters: vec![self.filter.clone()],
        };
        if let Err(e) = conn.send(&req).await {
            warn!(relay = %self.url, error = %e, "REQ failed");
            conn.close().await;
            return;
        }

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.token.cancelled() => None,
                frame = conn.recv() => Some(frame),
            };
            let Some(frame) = frame else {
                // A wedged socket must not keep this task (and its sender)
                // alive after cancel.
                let close = ClientMessage::Close(self.subscription_id.clone());
                if timeout(self.connect_timeout, conn.send(&close)).await.is_err() {
                    debug!(relay = %self.url, sub = %self.subscription_id, "CLOSE timed out");
                }
                break;
            };

            match frame {
                Ok(RelayMessage::Event {
                    subscription_id,
                    event,
                }) if subscription_id == self.subscription_id => {
                    // Relays are not trusted to apply the filter.
                    if !self.filter.matches(&event) {
                        debug!(relay = %self.url, id = %event.id(), "dropping unrequested event");
                        continue;
                    }
                    let delivery = RelayDelivery {
                        relay: self.url.clone(),
                        event,
                    };
                    let sent = tokio::select! {
                        biased;
                        _ = self.token.cancelled() => false,
                        sent = self.tx.send(delivery) => sent.is_ok(),
                    };
                    if !sent {
                        break;
                    }
                }
                Ok(RelayMessage::Eose(id)) if id == self.subscription_id => {
                    debug!(relay = %self.url, sub = %id, "backfill complete");
                }
                Ok(RelayMessage::Closed {
                    subscription_id,
                    message,
                }) if subscription_id == self.subscription_id => {
                    warn!(relay = %self.url, reason = %message, "relay closed subscription");
                    break;
                }
                Ok(RelayMessage::Notice(notice)) => {
                    debug!(relay = %self.url, notice = %notice, "relay notice");
                }
                Ok(_) => continue,
                Err(RelayError::Protocol(reason)) => {
                    debug!(relay = %self.url, reason = %reason, "skipping malformed frame");
                }
                Err(e) => {
                    warn!(relay = %self.url, error = %e, "subscription connection lost");
                    break;
                }
            }
        }

        drop(self.tx);
        let _ = timeout(self.connect_timeout, conn.close()).await;
        debug!(relay = %self.url, sub = %self.subscription_id, "relay task finished");
    }
}
