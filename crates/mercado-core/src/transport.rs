//! Message transport abstractions.
//!
//! The pipeline assumes an at-least-once pub/sub channel addressed by topic
//! pattern and routing key. Nothing here depends on a concrete broker.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

/// A message as carried by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Routing key, e.g. `affiliation.approved.v1`.
    pub routing_key: String,
    /// Serialized event envelope.
    pub payload: Vec<u8>,
}

impl Delivery {
    /// Creates a delivery.
    #[must_use]
    pub fn new(routing_key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            routing_key: routing_key.into(),
            payload,
        }
    }
}

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The broker refused or failed to take the message.
    #[error("publish failed: {0}")]
    Publish(String),

    /// The subscription could not be established.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,
}

/// Stream of deliveries for one subscription.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Delivery> + Send>>;

/// Publishing side of the transport.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes `payload` under `routing_key`.
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), TransportError>;
}

/// Subscribing side of the transport.
#[async_trait]
pub trait MessageSubscriber: Send + Sync {
    /// Subscribes to every routing key matching `pattern`.
    async fn subscribe(&self, pattern: &str) -> Result<DeliveryStream, TransportError>;
}

/// Failure reported by a [`DeliveryHandler`].
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Worth retrying: storage or network trouble.
    #[error("transient: {0}")]
    Transient(String),

    /// The delivery depends on state that has not arrived yet, such as a
    /// decision overtaking the submission it decides. The consumer parks it
    /// and tries again later instead of dropping it.
    #[error("deferred: {0}")]
    Deferred(String),

    /// Retrying cannot help: undecodable payload.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl HandlerError {
    /// Whether the consumer should retry the delivery in place.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the consumer should park the delivery for a later round.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

/// Processes deliveries for one consumer.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Handles one delivery.
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError>;
}
