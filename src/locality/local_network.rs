//! In-memory transport for testing.
//!
//! Every attached queue gets an inbox. Direct sends and forwards land in the
//! destination's inbox; publishes land in every attached inbox, including
//! the publisher's own (the same loop-back a real broker delivers). Nothing
//! is delivered automatically: tests drain inboxes and feed the envelopes to
//! the receiving node, which keeps multi-node scenarios deterministic.
//!
//! # Usage
//!
//! This module is available when the `test-utilities` feature is enabled,
//! or during unit tests:
//!
//! ```toml
//! [dev-dependencies]
//! commandeer = { path = ".", features = ["test-utilities"] }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use super::error::TransportError;
use super::transport::{InboundMessage, Transport, TransportResult};
use crate::types::QueueAddress;

/// How an envelope reached an inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Forwarded,
    Direct,
    Published,
}

/// One recorded send, in global send order.
#[derive(Debug, Clone)]
pub struct SentEnvelope {
    pub delivery: Delivery,
    pub destination: QueueAddress,
    pub message: InboundMessage,
}

#[derive(Debug, Default)]
struct NetworkState {
    inboxes: DashMap<QueueAddress, Vec<InboundMessage>>,
    unreachable: DashSet<QueueAddress>,
    log: Mutex<Vec<SentEnvelope>>,
    closed: AtomicBool,
}

/// Shared in-memory network. Clones see the same inboxes.
#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    state: Arc<NetworkState>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inbox for `queue`. Sends to unattached queues fail.
    pub fn attach(&self, queue: impl Into<QueueAddress>) {
        self.state.inboxes.entry(queue.into()).or_default();
    }

    /// Remove the inbox for `queue`, dropping anything undelivered.
    pub fn detach(&self, queue: &str) {
        self.state.inboxes.remove(queue);
    }

    /// Make every send to `queue` fail until [`LocalNetwork::set_reachable`].
    pub fn set_unreachable(&self, queue: impl Into<QueueAddress>) {
        self.state.unreachable.insert(queue.into());
    }

    pub fn set_reachable(&self, queue: &str) {
        self.state.unreachable.remove(queue);
    }

    /// Fail every subsequent operation with [`TransportError::Closed`].
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }

    /// Take everything waiting in `queue`'s inbox, oldest first.
    pub fn take_inbox(&self, queue: &str) -> Vec<InboundMessage> {
        self.state
            .inboxes
            .get_mut(queue)
            .map(|mut inbox| std::mem::take(&mut *inbox))
            .unwrap_or_default()
    }

    pub fn inbox_len(&self, queue: &str) -> usize {
        self.state
            .inboxes
            .get(queue)
            .map(|inbox| inbox.len())
            .unwrap_or(0)
    }

    /// Every send recorded so far.
    pub fn sent(&self) -> Vec<SentEnvelope> {
        self.log().clone()
    }

    /// Recorded sends of one delivery kind.
    pub fn sent_by(&self, delivery: Delivery) -> Vec<SentEnvelope> {
        self.log()
            .iter()
            .filter(|sent| sent.delivery == delivery)
            .cloned()
            .collect()
    }

    pub fn clear_log(&self) {
        self.log().clear();
    }

    fn log(&self) -> MutexGuard<'_, Vec<SentEnvelope>> {
        self.state
            .log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_open(&self) -> TransportResult<()> {
        if self.state.closed.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    fn deliver(
        &self,
        delivery: Delivery,
        destination: &QueueAddress,
        message: InboundMessage,
    ) -> TransportResult<()> {
        if self.state.unreachable.contains(destination.as_str()) {
            return Err(TransportError::Unreachable(destination.clone()));
        }
        match self.state.inboxes.get_mut(destination.as_str()) {
            Some(mut inbox) => inbox.push(message.clone()),
            None => return Err(TransportError::Unreachable(destination.clone())),
        }
        self.log().push(SentEnvelope {
            delivery,
            destination: destination.clone(),
            message,
        });
        Ok(())
    }
}

#[async_trait]
impl Transport for LocalNetwork {
    async fn forward(
        &self,
        message: &InboundMessage,
        destination: &QueueAddress,
    ) -> TransportResult<()> {
        self.check_open()?;
        self.deliver(Delivery::Forwarded, destination, message.clone())
    }

    async fn send_immediate(
        &self,
        destination: &QueueAddress,
        message: InboundMessage,
    ) -> TransportResult<()> {
        self.check_open()?;
        self.deliver(Delivery::Direct, destination, message)
    }

    async fn publish(&self, message: InboundMessage) -> TransportResult<()> {
        self.check_open()?;
        let subscribers: Vec<QueueAddress> = self
            .state
            .inboxes
            .iter()
            .map(|inbox| inbox.key().clone())
            .collect();
        for subscriber in subscribers {
            // Unreachable subscribers miss the publish; the publisher is not told.
            let _ = self.deliver(Delivery::Published, &subscriber, message.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_direct_send_lands_in_inbox() {
        let network = LocalNetwork::new();
        network.attach("node-b");
        let message = InboundMessage::new("PlaceOrder", Bytes::from_static(b"{}"));

        network
            .send_immediate(&QueueAddress::from("node-b"), message.clone())
            .await
            .unwrap();

        assert_eq!(network.take_inbox("node-b"), vec![message]);
        assert_eq!(network.inbox_len("node-b"), 0);
        assert_eq!(network.sent_by(Delivery::Direct).len(), 1);
    }

    #[tokio::test]
    async fn test_unattached_and_unreachable_fail() {
        let network = LocalNetwork::new();
        let message = InboundMessage::new("PlaceOrder", Bytes::new());
        let err = network
            .forward(&message, &QueueAddress::from("node-x"))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Unreachable(QueueAddress::from("node-x")));

        network.attach("node-b");
        network.set_unreachable("node-b");
        assert!(
            network
                .forward(&message, &QueueAddress::from("node-b"))
                .await
                .is_err()
        );
        network.set_reachable("node-b");
        assert!(
            network
                .forward(&message, &QueueAddress::from("node-b"))
                .await
                .is_ok()
        );
        assert!(network.sent().len() == 1);
    }

    #[tokio::test]
    async fn test_publish_reaches_every_inbox() {
        let network = LocalNetwork::new();
        network.attach("node-a");
        network.attach("node-b");
        network
            .publish(InboundMessage::new("Hello", Bytes::new()))
            .await
            .unwrap();
        assert_eq!(network.inbox_len("node-a"), 1);
        assert_eq!(network.inbox_len("node-b"), 1);
    }

    #[tokio::test]
    async fn test_closed_network() {
        let network = LocalNetwork::new();
        network.attach("node-a");
        network.close();
        let err = network
            .publish(InboundMessage::new("Hello", Bytes::new()))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Closed);
    }
}
