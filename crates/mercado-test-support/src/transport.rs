//! Test transports: mock `MessagePublisher` implementations for tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use mercado_core::transport::{Delivery, MessagePublisher, TransportError};

/// A publisher that records every accepted message. Routing keys registered
/// with [`fail_routing_key`](Self::fail_routing_key) are refused.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    published: Mutex<Vec<Delivery>>,
    failing_keys: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    /// Creates a transport that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses every publish to `routing_key` from now on.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_routing_key(&self, routing_key: &str) {
        self.failing_keys
            .lock()
            .unwrap()
            .insert(routing_key.to_owned());
    }

    /// Accepts publishes to `routing_key` again.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn heal_routing_key(&self, routing_key: &str) {
        self.failing_keys.lock().unwrap().remove(routing_key);
    }

    /// Returns a snapshot of every accepted message.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<Delivery> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagePublisher for RecordingTransport {
    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), TransportError> {
        if self.failing_keys.lock().unwrap().contains(routing_key) {
            return Err(TransportError::Publish(format!(
                "broker refused {routing_key}"
            )));
        }
        self.published
            .lock()
            .unwrap()
            .push(Delivery::new(routing_key, payload.to_vec()));
        Ok(())
    }
}

/// A publisher that refuses every message with the given reason.
#[derive(Debug)]
pub struct FailingTransport(pub String);

#[async_trait]
impl MessagePublisher for FailingTransport {
    async fn publish(&self, _routing_key: &str, _payload: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::Publish(self.0.clone()))
    }
}
