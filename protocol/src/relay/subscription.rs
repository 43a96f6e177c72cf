//! Subscriptions as cancellable channels.
//!
//! Relay tasks push into a bounded mpsc channel; the consumer pulls with
//! [`Subscription::recv`] or drives it as a [`Stream`]. Cancellation goes
//! through a shared [`CancellationToken`]:
//!
//! - `cancel()` is idempotent and safe from any task or thread.
//! - Once it returns, `recv()` yields `None` and the stream ends, even if
//!   deliveries are still sitting in the channel buffer.
//! - Relay tasks watch the same token, send `CLOSE` and hang up.
//!
//! Dropping the [`Subscription`] cancels it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::event::SignedEvent;

/// An event plus the relay it arrived from.
///
/// The gateway does not verify events. Anything coming out of a
/// subscription is untrusted until [`crate::event::verify`] says otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayDelivery {
    pub relay: String,
    pub event: SignedEvent,
}

/// Live subscription across every relay the gateway was configured with.
pub struct Subscription {
    id: String,
    receiver: mpsc::Receiver<RelayDelivery>,
    token: CancellationToken,
    // Registered with the token so a cancel wakes a pending `poll_next`
    // even while relay tasks still hold their senders.
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

/// Cloneable cancel handle, for cancelling from another task.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: String,
    token: CancellationToken,
}

impl Subscription {
    pub(crate) fn new(
        id: String,
        receiver: mpsc::Receiver<RelayDelivery>,
        token: CancellationToken,
    ) -> Self {
        let cancelled = Box::pin(token.clone().cancelled_owned());
        Self {
            id,
            receiver,
            token,
            cancelled,
        }
    }

    /// The subscription id sent in `REQ`/`CLOSE` frames.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            id: self.id.clone(),
            token: self.token.clone(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Next delivery, or `None` once cancelled or every relay task ended.
    pub async fn recv(&mut self) -> Option<RelayDelivery> {
        if self.token.is_cancelled() {
            return None;
        }
        let delivery = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            delivery = self.receiver.recv() => delivery,
        };
        // A cancel may have landed while the delivery was in flight.
        if self.token.is_cancelled() {
            return None;
        }
        delivery
    }
}

impl Stream for Subscription {
    type Item = RelayDelivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.token.is_cancelled() || self.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(_) if self.token.is_cancelled() => Poll::Ready(None),
            other => other,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl SubscriptionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use crate::event::EventBuilder;
    use futures::StreamExt;

    fn delivery() -> RelayDelivery {
        RelayDelivery {
            relay: "mem://a".into(),
            event: EventBuilder::new(1).sign(&Keypair::generate()).unwrap(),
        }
    }

    fn channel() -> (mpsc::Sender<RelayDelivery>, Subscription) {
        let (tx, rx) = mpsc::channel(8);
        (tx, Subscription::new("sub".into(), rx, CancellationToken::new()))
    }

    #[tokio::test]
    async fn recv_yields_deliveries_in_order() {
        let (tx, mut sub) = channel();
        let a = delivery();
        let b = delivery();
        tx.send(a.clone()).await.unwrap();
        tx.send(b.clone()).await.unwrap();
        assert_eq!(sub.recv().await, Some(a));
        assert_eq!(sub.recv().await, Some(b));
    }

    #[tokio::test]
    async fn nothing_is_yielded_after_cancel() {
        let (tx, mut sub) = channel();
        tx.send(delivery()).await.unwrap();
        tx.send(delivery()).await.unwrap();

        sub.cancel();
        assert_eq!(sub.recv().await, None);
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_shared_with_handles() {
        let (_tx, mut sub) = channel();
        let handle = sub.handle();
        assert_eq!(handle.id(), "sub");

        handle.cancel();
        handle.cancel();
        sub.cancel();
        assert!(sub.is_cancelled());
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn cancel_wakes_a_pending_recv() {
        let (_tx, mut sub) = channel();
        let handle = sub.handle();
        let waiter = tokio::spawn(async move { sub.recv().await });
        tokio::task::yield_now().await;
        handle.cancel();
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn cancel_wakes_a_pending_stream_while_senders_live() {
        // `tx` stays alive, as it would inside a relay task stuck on I/O.
        let (tx, mut sub) = channel();
        let handle = sub.handle();
        let waiter = tokio::spawn(async move { sub.next().await });
        tokio::task::yield_now().await;
        handle.cancel();

        let next = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("cancel woke the stream")
            .unwrap();
        assert_eq!(next, None);
        drop(tx);
    }

    #[tokio::test]
    async fn drop_cancels() {
        let (_tx, sub) = channel();
        let handle = sub.handle();
        drop(sub);
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn ends_when_all_senders_drop() {
        let (tx, mut sub) = channel();
        drop(tx);
        assert_eq!(sub.recv().await, None);
    }
}
