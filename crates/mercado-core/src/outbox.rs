//! Outbox record model and store abstraction.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::DomainEvent;

/// Maximum length of the `last_error` column.
pub const MAX_ERROR_LEN: usize = 500;

/// Schema version appended to event types that carry none.
pub const DEFAULT_SCHEMA_VERSION: &str = "v1";

/// Delivery status of an outbox record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    /// Written, not yet published.
    Pending,
    /// Published to the transport.
    Sent,
    /// Last publish attempt failed; eligible again once `next_attempt_at` passes.
    Failed,
    /// Retries exhausted; only an explicit requeue makes it eligible again.
    DeadLettered,
}

impl OutboxStatus {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
            Self::DeadLettered => "DEAD_LETTERED",
        }
    }

    /// Parses the database representation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` for an unknown status string.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SENT" => Ok(Self::Sent),
            "FAILED" => Ok(Self::Failed),
            "DEAD_LETTERED" => Ok(Self::DeadLettered),
            other => Err(DomainError::Infrastructure(format!(
                "invalid outbox status: {other}"
            ))),
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbox row about to be inserted alongside an aggregate state change.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOutboxRecord {
    /// Event identifier; unique across the outbox.
    pub event_id: Uuid,
    /// Stable event type name.
    pub event_type: String,
    /// Serialized [`EventEnvelope`](crate::event::EventEnvelope).
    pub payload: serde_json::Value,
    /// Aggregate the event belongs to.
    pub aggregate_id: String,
    /// Partition key copied from the event metadata.
    pub partition_key: Option<String>,
    /// Domain time of the event.
    pub occurred_at: DateTime<Utc>,
}

impl NewOutboxRecord {
    /// Serializes a domain event into an outbox row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the event cannot be serialized.
    pub fn from_event<E: DomainEvent>(event: &E) -> Result<Self, DomainError> {
        let envelope = event.to_envelope().map_err(|e| {
            DomainError::Infrastructure(format!(
                "failed to serialize event {}: {e}",
                event.event_type()
            ))
        })?;
        let payload = serde_json::to_value(&envelope).map_err(|e| {
            DomainError::Infrastructure(format!(
                "failed to serialize envelope {}: {e}",
                event.event_type()
            ))
        })?;
        let meta = event.metadata();
        Ok(Self {
            event_id: event.event_id(),
            event_type: event.event_type().to_owned(),
            payload,
            aggregate_id: meta.aggregate_id().to_owned(),
            partition_key: meta.partition_key().map(str::to_owned),
            occurred_at: event.occurred_at(),
        })
    }
}

/// A persisted outbox row.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxRecord {
    /// Surrogate key.
    pub id: i64,
    /// Event identifier; unique across the outbox.
    pub event_id: Uuid,
    /// Stable event type name.
    pub event_type: String,
    /// Serialized event envelope.
    pub payload: serde_json::Value,
    /// Aggregate the event belongs to.
    pub aggregate_id: String,
    /// Partition key copied from the event metadata.
    pub partition_key: Option<String>,
    /// Delivery status.
    pub status: OutboxStatus,
    /// Number of failed publish attempts so far.
    pub attempts: i32,
    /// Domain time of the event.
    pub occurred_at: DateTime<Utc>,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
    /// When the row was published, if it has been.
    pub sent_at: Option<DateTime<Utc>>,
    /// Earliest time a FAILED row may be claimed again.
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Truncated message of the most recent publish failure.
    pub last_error: Option<String>,
}

impl OutboxRecord {
    /// Routing key this record is published under.
    #[must_use]
    pub fn routing_key(&self) -> String {
        routing_key(&self.event_type)
    }
}

/// Builds the transport routing key `<event_type>.v<N>`, appending
/// [`DEFAULT_SCHEMA_VERSION`] when the type carries no version suffix.
#[must_use]
pub fn routing_key(event_type: &str) -> String {
    if has_version_suffix(event_type) {
        event_type.to_owned()
    } else {
        format!("{event_type}.{DEFAULT_SCHEMA_VERSION}")
    }
}

fn has_version_suffix(event_type: &str) -> bool {
    event_type
        .rsplit_once('.')
        .and_then(|(_, last)| last.strip_prefix('v'))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Truncates an error message to [`MAX_ERROR_LEN`] characters.
#[must_use]
pub fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_LEN).collect()
}

/// Parameters for leasing a batch of publishable rows.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    /// Identity of the publisher instance taking the lease.
    pub owner: String,
    /// Maximum number of rows to lease.
    pub limit: i64,
    /// Current time; FAILED rows whose `next_attempt_at` lies in the future
    /// and rows under an unexpired lease are skipped.
    pub now: DateTime<Utc>,
    /// Lease expiry written onto the claimed rows.
    pub lease_until: DateTime<Utc>,
}

/// Result of publishing one leased row.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    /// The transport accepted the payload.
    Sent {
        /// Outbox row ID.
        record_id: i64,
        /// Publish time.
        sent_at: DateTime<Utc>,
    },
    /// The publish failed and the row will be retried.
    Failed {
        /// Outbox row ID.
        record_id: i64,
        /// Truncated failure message.
        error: String,
        /// Earliest retry time.
        next_attempt_at: DateTime<Utc>,
    },
    /// The publish failed and retries are exhausted.
    DeadLettered {
        /// Outbox row ID.
        record_id: i64,
        /// Truncated failure message.
        error: String,
    },
}

impl DeliveryOutcome {
    /// The outbox row this outcome applies to.
    #[must_use]
    pub fn record_id(&self) -> i64 {
        match self {
            Self::Sent { record_id, .. }
            | Self::Failed { record_id, .. }
            | Self::DeadLettered { record_id, .. } => *record_id,
        }
    }
}

/// Publisher-facing side of the outbox.
///
/// Rows are written by [`AggregateRepository::save`](crate::repository::AggregateRepository::save);
/// this trait only leases and settles them.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Leases up to `request.limit` publishable rows (PENDING, or FAILED and
    /// due), oldest `occurred_at` first. Rows leased by another owner whose
    /// lease has not expired are skipped, never waited on.
    async fn claim_batch(&self, request: &ClaimRequest) -> Result<Vec<OutboxRecord>, DomainError>;

    /// Applies every outcome of a batch in one transaction and releases the
    /// leases held by `owner`.
    async fn complete_batch(
        &self,
        owner: &str,
        outcomes: &[DeliveryOutcome],
    ) -> Result<(), DomainError>;

    /// Looks up a row by event ID.
    async fn find_by_event_id(&self, event_id: Uuid) -> Result<Option<OutboxRecord>, DomainError>;

    /// Moves a dead-lettered row back to PENDING with a fresh attempt count.
    /// Returns `false` if no dead-lettered row has that event ID.
    async fn requeue(&self, event_id: Uuid) -> Result<bool, DomainError>;

    /// Moves a SENT row back to PENDING so the publisher delivers it again.
    /// Consumers deduplicate by event ID, so this recovers a delivery a
    /// consumer never managed to handle without double-applying it anywhere
    /// else. Returns `false` if no sent row has that event ID.
    async fn replay(&self, event_id: Uuid) -> Result<bool, DomainError>;
}
