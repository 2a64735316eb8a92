//! In-process pub/sub broker.
//!
//! Every subscription gets its own unbounded queue; a publish is copied to
//! each subscription whose pattern matches the routing key. Delivery is
//! at-least-once from the publisher's point of view: a publish that returns
//! `Ok` has been queued for every live matching subscriber.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use mercado_core::transport::{
    Delivery, DeliveryStream, MessagePublisher, MessageSubscriber, TransportError,
};
use tokio::sync::mpsc;
use tracing::debug;

use crate::topic::matches;

#[derive(Debug)]
struct Subscription {
    pattern: String,
    sender: mpsc::UnboundedSender<Delivery>,
}

/// An in-process topic broker implementing both transport traits.
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl InMemoryBroker {
    /// Creates a broker with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Subscription>>, TransportError> {
        self.subscriptions
            .lock()
            .map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut subscriptions = self.lock()?;
        // Dropped streams close their receivers; forget those subscriptions.
        subscriptions.retain(|s| !s.sender.is_closed());
        let mut fanout = 0_usize;
        for subscription in subscriptions.iter() {
            if matches(&subscription.pattern, routing_key) {
                subscription
                    .sender
                    .send(Delivery::new(routing_key, payload.to_vec()))
                    .map_err(|_| TransportError::Closed)?;
                fanout += 1;
            }
        }
        debug!(routing_key, fanout, "message published");
        Ok(())
    }
}

#[async_trait]
impl MessageSubscriber for InMemoryBroker {
    async fn subscribe(&self, pattern: &str) -> Result<DeliveryStream, TransportError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock()?.push(Subscription {
            pattern: pattern.to_owned(),
            sender,
        });
        debug!(pattern, "subscription registered");
        let deliveries = stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|delivery| (delivery, receiver))
        });
        Ok(Box::pin(deliveries))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use mercado_core::transport::{MessagePublisher, MessageSubscriber};

    use super::InMemoryBroker;

    #[tokio::test]
    async fn test_publish_reaches_only_matching_subscribers() {
        // Arrange
        let broker = InMemoryBroker::new();
        let mut affiliations = broker.subscribe("affiliation.#").await.unwrap();
        let mut approvals = broker.subscribe("affiliation.approved.v1").await.unwrap();

        // Act
        broker
            .publish("affiliation.submitted.v1", b"first")
            .await
            .unwrap();
        broker
            .publish("affiliation.approved.v1", b"second")
            .await
            .unwrap();

        // Assert
        let first = affiliations.next().await.unwrap();
        let second = affiliations.next().await.unwrap();
        assert_eq!(first.routing_key, "affiliation.submitted.v1");
        assert_eq!(second.payload, b"second");
        let approval = approvals.next().await.unwrap();
        assert_eq!(approval.routing_key, "affiliation.approved.v1");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let broker = InMemoryBroker::new();

        assert!(broker.publish("user.registered.v1", b"{}").await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_forgotten() {
        // Arrange
        let broker = InMemoryBroker::new();
        let stream = broker.subscribe("#").await.unwrap();
        drop(stream);

        // Act
        let result = broker.publish("user.registered.v1", b"{}").await;

        // Assert
        assert!(result.is_ok());
        assert!(broker.subscriptions.lock().unwrap().is_empty());
    }
}
