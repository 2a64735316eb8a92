//! Domain events for the Producer Application context.

use chrono::{DateTime, Utc};
use mercado_core::event::{DomainEvent, EventEnvelope, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::ProducerProfile;

/// Emitted when a producer applies to sell through a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerApplicationSubmitted {
    /// The application identifier.
    pub application_id: String,
    /// The zone applied to.
    pub zone_id: String,
    /// The applying user.
    pub producer_id: String,
    /// Declared producer data.
    pub profile: ProducerProfile,
}

/// Emitted when a zone administrator accepts a producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerApplicationApproved {
    /// The application identifier.
    pub application_id: String,
    /// The zone the producer joins.
    pub zone_id: String,
    /// The accepted user.
    pub producer_id: String,
    /// The administrator who decided.
    pub decided_by: String,
    /// Free-text notes on the decision.
    pub notes: Option<String>,
}

/// Emitted when a zone administrator turns a producer down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerApplicationRejected {
    /// The application identifier.
    pub application_id: String,
    /// The zone applied to.
    pub zone_id: String,
    /// The rejected user.
    pub producer_id: String,
    /// The administrator who decided.
    pub decided_by: String,
    /// Free-text notes on the decision.
    pub notes: Option<String>,
}

/// Event type identifier for [`ProducerApplicationSubmitted`].
pub const PRODUCER_APPLICATION_SUBMITTED_EVENT_TYPE: &str = "producer_application.submitted";

/// Event type identifier for [`ProducerApplicationApproved`].
pub const PRODUCER_APPLICATION_APPROVED_EVENT_TYPE: &str = "producer_application.approved";

/// Event type identifier for [`ProducerApplicationRejected`].
pub const PRODUCER_APPLICATION_REJECTED_EVENT_TYPE: &str = "producer_application.rejected";

/// Event payload variants for the Producer Application context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProducerApplicationEventKind {
    /// A producer applied.
    Submitted(ProducerApplicationSubmitted),
    /// The application was approved.
    Approved(ProducerApplicationApproved),
    /// The application was rejected.
    Rejected(ProducerApplicationRejected),
}

/// Domain event envelope for the Producer Application context.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerApplicationEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Domain time of the event.
    pub occurred_at: DateTime<Utc>,
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: ProducerApplicationEventKind,
}

impl ProducerApplicationEvent {
    /// Rebuilds an event from its wire envelope.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload is not a
    /// [`ProducerApplicationEventKind`].
    pub fn from_envelope(envelope: EventEnvelope) -> Result<Self, serde_json::Error> {
        let kind = serde_json::from_value(envelope.payload)?;
        Ok(Self {
            event_id: envelope.event_id,
            occurred_at: envelope.occurred_at,
            metadata: envelope.meta,
            kind,
        })
    }
}

impl DomainEvent for ProducerApplicationEvent {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn event_type(&self) -> &'static str {
        match &self.kind {
            ProducerApplicationEventKind::Submitted(_) => PRODUCER_APPLICATION_SUBMITTED_EVENT_TYPE,
            ProducerApplicationEventKind::Approved(_) => PRODUCER_APPLICATION_APPROVED_EVENT_TYPE,
            ProducerApplicationEventKind::Rejected(_) => PRODUCER_APPLICATION_REJECTED_EVENT_TYPE,
        }
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.kind)
    }
}
