//! Outbox publisher.
//!
//! Each cycle leases a batch of publishable rows, publishes them one by one
//! outside any database transaction, then settles every outcome of the batch
//! in a single transaction. A publish failure only affects its own row.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mercado_core::clock::Clock;
use mercado_core::error::DomainError;
use mercado_core::outbox::{ClaimRequest, DeliveryOutcome, OutboxRecord, OutboxStore, truncate_error};
use mercado_core::retry::RetryPolicy;
use mercado_core::transport::MessagePublisher;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Publisher settings.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Lease owner name; unique per running publisher.
    pub instance_id: String,
    /// Maximum rows per cycle.
    pub batch_size: i64,
    /// Pause between cycles.
    pub poll_interval: Duration,
    /// How long a claimed row stays reserved for this instance.
    pub lease_duration: Duration,
    /// Backoff and dead-letter threshold for failed rows.
    pub retry: RetryPolicy,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            instance_id: format!("publisher-{}", Uuid::new_v4()),
            batch_size: 100,
            poll_interval: Duration::from_secs(5),
            lease_duration: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Counts from one publisher cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Rows leased this cycle.
    pub claimed: usize,
    /// Rows accepted by the transport.
    pub sent: usize,
    /// Rows scheduled for retry.
    pub failed: usize,
    /// Rows that ran out of retries.
    pub dead_lettered: usize,
}

/// Moves outbox rows onto the transport.
pub struct OutboxPublisher {
    store: Arc<dyn OutboxStore>,
    transport: Arc<dyn MessagePublisher>,
    clock: Arc<dyn Clock>,
    config: PublisherConfig,
}

fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl OutboxPublisher {
    /// Creates a publisher.
    #[must_use]
    pub fn new(
        store: Arc<dyn OutboxStore>,
        transport: Arc<dyn MessagePublisher>,
        clock: Arc<dyn Clock>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            store,
            transport,
            clock,
            config,
        }
    }

    /// Runs one publish cycle.
    ///
    /// # Errors
    ///
    /// Returns the store error if claiming or settling the batch fails. A
    /// claim failure leaves every row untouched; a settle failure leaves the
    /// batch leased until the lease expires, after which it is published
    /// again.
    #[instrument(skip(self), fields(instance = %self.config.instance_id))]
    pub async fn run_once(&self) -> Result<PublishReport, DomainError> {
        let now = self.clock.now();
        let request = ClaimRequest {
            owner: self.config.instance_id.clone(),
            limit: self.config.batch_size,
            now,
            lease_until: after(now, self.config.lease_duration),
        };
        let records = self.store.claim_batch(&request).await?;
        let mut report = PublishReport {
            claimed: records.len(),
            ..PublishReport::default()
        };
        if records.is_empty() {
            return Ok(report);
        }

        let mut outcomes = Vec::with_capacity(records.len());
        for record in &records {
            let outcome = self.publish_one(record).await;
            match outcome {
                DeliveryOutcome::Sent { .. } => report.sent += 1,
                DeliveryOutcome::Failed { .. } => report.failed += 1,
                DeliveryOutcome::DeadLettered { .. } => report.dead_lettered += 1,
            }
            outcomes.push(outcome);
        }

        self.store
            .complete_batch(&self.config.instance_id, &outcomes)
            .await?;
        info!(
            claimed = report.claimed,
            sent = report.sent,
            failed = report.failed,
            dead_lettered = report.dead_lettered,
            "outbox batch published"
        );
        Ok(report)
    }

    async fn publish_one(&self, record: &OutboxRecord) -> DeliveryOutcome {
        let routing_key = record.routing_key();
        let result = match serde_json::to_vec(&record.payload) {
            Ok(bytes) => self
                .transport
                .publish(&routing_key, &bytes)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(format!("payload encoding failed: {e}")),
        };

        let message = match result {
            Ok(()) => {
                return DeliveryOutcome::Sent {
                    record_id: record.id,
                    sent_at: self.clock.now(),
                };
            }
            Err(message) => truncate_error(&message),
        };

        let attempts = u32::try_from(record.attempts).unwrap_or(0).saturating_add(1);
        if self.config.retry.is_exhausted(attempts) {
            error!(
                event_id = %record.event_id,
                event_type = %record.event_type,
                routing_key = %routing_key,
                attempts,
                error = %message,
                "outbox row dead-lettered"
            );
            return DeliveryOutcome::DeadLettered {
                record_id: record.id,
                error: message,
            };
        }

        let next_attempt_at = after(self.clock.now(), self.config.retry.delay_for_attempt(attempts));
        warn!(
            event_id = %record.event_id,
            event_type = %record.event_type,
            routing_key = %routing_key,
            attempts,
            %next_attempt_at,
            error = %message,
            "outbox publish failed"
        );
        DeliveryOutcome::Failed {
            record_id: record.id,
            error: message,
            next_attempt_at,
        }
    }

    /// Publishes on a fixed interval until `shutdown` turns `true`.
    ///
    /// A failing cycle is logged and the loop carries on.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            instance = %self.config.instance_id,
            poll_interval_ms = u64::try_from(self.config.poll_interval.as_millis()).unwrap_or(u64::MAX),
            "outbox publisher started"
        );
        while !*shutdown.borrow() {
            if let Err(e) = self.run_once().await {
                error!(error = %e, "outbox publisher cycle failed");
            }
            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(instance = %self.config.instance_id, "outbox publisher stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use mercado_core::event::{EventEnvelope, EventMetadata};
    use mercado_core::outbox::{MAX_ERROR_LEN, NewOutboxRecord, OutboxStatus, OutboxStore};
    use mercado_core::retry::RetryPolicy;
    use mercado_test_support::{
        FailingTransport, InMemoryCommandStore, ManualClock, RecordingTransport,
    };
    use tokio::sync::watch;
    use uuid::Uuid;

    use super::{OutboxPublisher, PublisherConfig};

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn record(event_type: &str, minute: u32) -> NewOutboxRecord {
        let event_id = Uuid::new_v4();
        let occurred_at = Utc.with_ymd_and_hms(2026, 1, 15, 9, minute, 0).unwrap();
        let envelope = EventEnvelope {
            event_id,
            event_type: event_type.to_owned(),
            occurred_at,
            meta: EventMetadata::new("ZoneAffiliation", "AFI-1", 1),
            payload: serde_json::json!({}),
        };
        NewOutboxRecord {
            event_id,
            event_type: event_type.to_owned(),
            payload: serde_json::to_value(envelope).unwrap(),
            aggregate_id: "AFI-1".to_owned(),
            partition_key: Some("ZON-1".to_owned()),
            occurred_at,
        }
    }

    fn config(instance_id: &str) -> PublisherConfig {
        PublisherConfig {
            instance_id: instance_id.to_owned(),
            batch_size: 100,
            poll_interval: Duration::from_millis(10),
            lease_duration: Duration::from_secs(30),
            retry: RetryPolicy::builder().max_attempts(3).build(),
        }
    }

    fn publisher(
        store: &Arc<InMemoryCommandStore>,
        transport: Arc<RecordingTransport>,
        clock: &Arc<ManualClock>,
    ) -> OutboxPublisher {
        OutboxPublisher::new(store.clone(), transport, clock.clone(), config("publisher-a"))
    }

    #[tokio::test]
    async fn test_run_once_publishes_in_occurrence_order_and_marks_sent() {
        // Arrange
        let store = Arc::new(InMemoryCommandStore::new());
        store.insert_outbox(record("affiliation.approved", 30));
        store.insert_outbox(record("affiliation.submitted", 10));
        let transport = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new(start()));

        // Act
        let report = publisher(&store, transport.clone(), &clock)
            .run_once()
            .await
            .unwrap();

        // Assert
        assert_eq!(report.claimed, 2);
        assert_eq!(report.sent, 2);
        let keys: Vec<String> = transport
            .published()
            .into_iter()
            .map(|d| d.routing_key)
            .collect();
        assert_eq!(keys, ["affiliation.submitted.v1", "affiliation.approved.v1"]);
        for row in store.outbox_records() {
            assert_eq!(row.status, OutboxStatus::Sent);
            assert_eq!(row.sent_at, Some(start()));
            assert!(row.last_error.is_none());
        }
    }

    #[tokio::test]
    async fn test_published_payload_is_the_stored_envelope() {
        let store = Arc::new(InMemoryCommandStore::new());
        let new = record("affiliation.submitted", 10);
        let event_id = new.event_id;
        store.insert_outbox(new);
        let transport = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new(start()));

        publisher(&store, transport.clone(), &clock)
            .run_once()
            .await
            .unwrap();

        let envelope = EventEnvelope::from_slice(&transport.published()[0].payload).unwrap();
        assert_eq!(envelope.event_id, event_id);
    }

    #[tokio::test]
    async fn test_publish_failure_is_isolated_to_its_row() {
        // Arrange
        let store = Arc::new(InMemoryCommandStore::new());
        store.insert_outbox(record("affiliation.submitted", 10));
        let failing_id = store.insert_outbox(record("affiliation.approved", 20));
        let transport = Arc::new(RecordingTransport::new());
        transport.fail_routing_key("affiliation.approved.v1");
        let clock = Arc::new(ManualClock::new(start()));

        // Act
        let report = publisher(&store, transport.clone(), &clock)
            .run_once()
            .await
            .unwrap();

        // Assert
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        let failed = store
            .outbox_records()
            .into_iter()
            .find(|r| r.id == failing_id)
            .unwrap();
        assert_eq!(failed.status, OutboxStatus::Failed);
        assert_eq!(failed.attempts, 1);
        assert_eq!(failed.next_attempt_at, Some(start() + chrono::Duration::seconds(5)));
        assert!(failed.last_error.unwrap().contains("affiliation.approved.v1"));
        assert!(store.lease_owner(failing_id).is_none());
    }

    #[tokio::test]
    async fn test_failed_row_waits_for_backoff_then_succeeds() {
        // Arrange
        let store = Arc::new(InMemoryCommandStore::new());
        let id = store.insert_outbox(record("affiliation.approved", 20));
        let transport = Arc::new(RecordingTransport::new());
        transport.fail_routing_key("affiliation.approved.v1");
        let clock = Arc::new(ManualClock::new(start()));
        let publisher = publisher(&store, transport.clone(), &clock);
        publisher.run_once().await.unwrap();
        transport.heal_routing_key("affiliation.approved.v1");

        // Act
        let too_early = publisher.run_once().await.unwrap();
        clock.advance(chrono::Duration::seconds(5));
        let due = publisher.run_once().await.unwrap();

        // Assert
        assert_eq!(too_early.claimed, 0);
        assert_eq!(due.sent, 1);
        let row = store.outbox_records().into_iter().find(|r| r.id == id).unwrap();
        assert_eq!(row.status, OutboxStatus::Sent);
        assert!(row.last_error.is_none());
        assert_eq!(transport.published().len(), 1);
    }

    #[tokio::test]
    async fn test_row_is_dead_lettered_after_max_attempts_and_can_be_requeued() {
        // Arrange
        let store = Arc::new(InMemoryCommandStore::new());
        let new = record("affiliation.approved", 20);
        let event_id = new.event_id;
        store.insert_outbox(new);
        let transport = Arc::new(RecordingTransport::new());
        transport.fail_routing_key("affiliation.approved.v1");
        let clock = Arc::new(ManualClock::new(start()));
        let publisher = publisher(&store, transport.clone(), &clock);

        // Act
        for _ in 0..3 {
            publisher.run_once().await.unwrap();
            clock.advance(chrono::Duration::minutes(10));
        }
        let after_dead_letter = publisher.run_once().await.unwrap();

        // Assert
        let row = store.find_by_event_id(event_id).await.unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::DeadLettered);
        assert_eq!(row.attempts, 3);
        assert_eq!(after_dead_letter.claimed, 0);

        transport.heal_routing_key("affiliation.approved.v1");
        assert!(store.requeue(event_id).await.unwrap());
        assert!(!store.requeue(event_id).await.unwrap());
        let report = publisher.run_once().await.unwrap();
        assert_eq!(report.sent, 1);
    }

    #[tokio::test]
    async fn test_stored_error_is_truncated() {
        // Arrange
        let store = Arc::new(InMemoryCommandStore::new());
        let id = store.insert_outbox(record("affiliation.approved", 20));
        let clock = Arc::new(ManualClock::new(start()));
        let publisher = OutboxPublisher::new(
            store.clone(),
            Arc::new(FailingTransport("x".repeat(2_000))),
            clock,
            config("publisher-a"),
        );

        // Act
        publisher.run_once().await.unwrap();

        // Assert
        let row = store.outbox_records().into_iter().find(|r| r.id == id).unwrap();
        assert_eq!(row.last_error.unwrap().chars().count(), MAX_ERROR_LEN);
    }

    #[tokio::test]
    async fn test_concurrent_publishers_never_publish_a_row_twice() {
        // Arrange
        let store = Arc::new(InMemoryCommandStore::new());
        for minute in 0..50 {
            store.insert_outbox(record("affiliation.submitted", minute));
        }
        let transport = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new(start()));
        let mut small_batches = config("publisher-a");
        small_batches.batch_size = 7;
        let a = OutboxPublisher::new(store.clone(), transport.clone(), clock.clone(), small_batches.clone());
        small_batches.instance_id = "publisher-b".to_owned();
        let b = OutboxPublisher::new(store.clone(), transport.clone(), clock.clone(), small_batches);

        // Act
        loop {
            let (ra, rb) = tokio::join!(a.run_once(), b.run_once());
            if ra.unwrap().claimed + rb.unwrap().claimed == 0 {
                break;
            }
        }

        // Assert
        let mut published: Vec<Uuid> = transport
            .published()
            .iter()
            .map(|d| EventEnvelope::from_slice(&d.payload).unwrap().event_id)
            .collect();
        assert_eq!(published.len(), 50);
        published.sort();
        published.dedup();
        assert_eq!(published.len(), 50);
    }

    #[tokio::test]
    async fn test_run_stops_when_shutdown_is_signalled() {
        // Arrange
        let store = Arc::new(InMemoryCommandStore::new());
        store.insert_outbox(record("affiliation.submitted", 10));
        let transport = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new(start()));
        let publisher = Arc::new(publisher(&store, transport.clone(), &clock));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let publisher = publisher.clone();
            tokio::spawn(async move { publisher.run(shutdown_rx).await })
        };

        // Act
        while transport.published().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown_tx.send(true).unwrap();

        // Assert
        let stopped = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(stopped.is_ok());
    }
}
