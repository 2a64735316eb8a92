//! Generic consumer loop.
//!
//! Subscribes to a topic pattern and hands each delivery to a
//! [`DeliveryHandler`]. Transient handler failures are retried in place with
//! exponential backoff. Deferred failures, and transient ones that exhaust
//! their in-place retries, are parked and offered to the handler again in
//! later rounds, each round further out per the same policy. Only permanent
//! failures drop a delivery. Whatever is still parked at shutdown is logged
//! with its event id so the outbox row can be replayed.

use std::mem;
use std::sync::Arc;

use futures::StreamExt;
use mercado_core::event::EventEnvelope;
use mercado_core::retry::RetryPolicy;
use mercado_core::transport::{
    Delivery, DeliveryHandler, DeliveryStream, MessageSubscriber, TransportError,
};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// The handler succeeded after `attempts` tries.
    Handled {
        /// Tries it took, the successful one included.
        attempts: u32,
    },
    /// Set aside for a later round.
    Parked {
        /// Tries made in this round.
        attempts: u32,
        /// Last handler error.
        reason: String,
    },
    /// The delivery was given up on.
    Dropped {
        /// Final handler error.
        reason: String,
    },
}

/// Runs `handler` on one delivery, retrying transient failures per `retry`.
pub async fn process_delivery(
    handler: &dyn DeliveryHandler,
    delivery: &Delivery,
    retry: &RetryPolicy,
) -> DeliveryResult {
    let mut attempt = 1_u32;
    loop {
        match handler.handle(delivery).await {
            Ok(()) => return DeliveryResult::Handled { attempts: attempt },
            Err(e) if e.is_transient() && !retry.is_exhausted(attempt) => {
                let delay = retry.delay_for_attempt(attempt);
                warn!(
                    consumer = handler.name(),
                    routing_key = %delivery.routing_key,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) if e.is_transient() || e.is_deferred() => {
                warn!(
                    consumer = handler.name(),
                    routing_key = %delivery.routing_key,
                    attempt,
                    error = %e,
                    "delivery parked"
                );
                return DeliveryResult::Parked {
                    attempts: attempt,
                    reason: e.to_string(),
                };
            }
            Err(e) => {
                error!(
                    consumer = handler.name(),
                    routing_key = %delivery.routing_key,
                    attempt,
                    error = %e,
                    "delivery dropped"
                );
                return DeliveryResult::Dropped {
                    reason: e.to_string(),
                };
            }
        }
    }
}

/// Consumes `pattern` until `shutdown` turns `true` or the stream ends.
///
/// # Errors
///
/// Returns the transport error if the subscription cannot be established.
pub async fn run_consumer(
    subscriber: Arc<dyn MessageSubscriber>,
    pattern: &str,
    handler: Arc<dyn DeliveryHandler>,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
) -> Result<(), TransportError> {
    let deliveries = subscriber.subscribe(pattern).await?;
    info!(consumer = handler.name(), pattern, "consumer subscribed");
    consume(deliveries, handler, retry, shutdown).await;
    Ok(())
}

/// A delivery waiting for its next round.
#[derive(Debug)]
struct ParkedDelivery {
    delivery: Delivery,
    rounds: u32,
    due: Instant,
}

/// Deliveries set aside by one consumer, in arrival order.
#[derive(Debug, Default)]
struct ParkingLot {
    entries: Vec<ParkedDelivery>,
}

impl ParkingLot {
    /// Parks `delivery` after its `rounds`-th unsuccessful round.
    fn park(&mut self, delivery: Delivery, rounds: u32, retry: &RetryPolicy) {
        let due = Instant::now() + retry.delay_for_attempt(rounds);
        self.entries.push(ParkedDelivery {
            delivery,
            rounds,
            due,
        });
    }

    fn next_due(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.due).min()
    }

    /// Removes and returns every entry due at `now`, oldest first.
    fn take_due(&mut self, now: Instant) -> Vec<ParkedDelivery> {
        let (due, waiting): (Vec<_>, Vec<_>) = mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.due <= now);
        self.entries = waiting;
        due
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

async fn wait_until(due: Option<Instant>) {
    match due {
        Some(due) => tokio::time::sleep_until(due).await,
        None => std::future::pending().await,
    }
}

/// Drains an established subscription until `shutdown` turns `true` or the
/// stream ends.
pub async fn consume(
    mut deliveries: DeliveryStream,
    handler: Arc<dyn DeliveryHandler>,
    retry: RetryPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    let consumer = handler.name();
    let mut parked = ParkingLot::default();
    info!(consumer, "consumer started");

    while !*shutdown.borrow() {
        tokio::select! {
            next = deliveries.next() => {
                let Some(delivery) = next else {
                    warn!(consumer, "delivery stream closed");
                    break;
                };
                let result = process_delivery(handler.as_ref(), &delivery, &retry).await;
                if matches!(result, DeliveryResult::Parked { .. }) {
                    parked.park(delivery, 1, &retry);
                }
            }
            () = wait_until(parked.next_due()) => {
                for entry in parked.take_due(Instant::now()) {
                    let result = process_delivery(handler.as_ref(), &entry.delivery, &retry).await;
                    match result {
                        DeliveryResult::Parked { .. } => {
                            parked.park(entry.delivery, entry.rounds.saturating_add(1), &retry);
                        }
                        DeliveryResult::Handled { .. } => {
                            info!(
                                consumer,
                                routing_key = %entry.delivery.routing_key,
                                rounds = entry.rounds,
                                "parked delivery handled"
                            );
                        }
                        DeliveryResult::Dropped { .. } => {}
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    for entry in &parked.entries {
        let event_id = EventEnvelope::from_slice(&entry.delivery.payload)
            .map(|envelope| envelope.event_id.to_string())
            .unwrap_or_default();
        error!(
            consumer,
            alert = true,
            routing_key = %entry.delivery.routing_key,
            event_id = %event_id,
            rounds = entry.rounds,
            "delivery still parked at shutdown, replay its outbox row"
        );
    }
    info!(consumer, parked = parked.len(), "consumer stopped");
}
