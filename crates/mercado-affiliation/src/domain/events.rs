//! Domain events for the Zone Affiliation context.

use chrono::{DateTime, Utc};
use mercado_core::event::{DomainEvent, EventEnvelope, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::details::ZoneDetails;

/// Emitted when a zone asks to join the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationSubmitted {
    /// The affiliation identifier.
    pub affiliation_id: String,
    /// The zone being affiliated.
    pub zone_id: String,
    /// The user who filed the request.
    pub requester_id: String,
    /// Zone data supplied with the request.
    pub details: ZoneDetails,
}

/// Emitted when a global administrator approves an affiliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationApproved {
    /// The affiliation identifier.
    pub affiliation_id: String,
    /// The affiliated zone.
    pub zone_id: String,
    /// The user who filed the request.
    pub requester_id: String,
    /// The administrator who decided.
    pub decided_by: String,
    /// Free-text notes on the decision.
    pub notes: Option<String>,
}

/// Emitted when a global administrator rejects an affiliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationRejected {
    /// The affiliation identifier.
    pub affiliation_id: String,
    /// The zone that asked to join.
    pub zone_id: String,
    /// The user who filed the request.
    pub requester_id: String,
    /// The administrator who decided.
    pub decided_by: String,
    /// Free-text notes on the decision.
    pub notes: Option<String>,
}

/// Event type identifier for [`AffiliationSubmitted`].
pub const AFFILIATION_SUBMITTED_EVENT_TYPE: &str = "affiliation.submitted";

/// Event type identifier for [`AffiliationApproved`].
pub const AFFILIATION_APPROVED_EVENT_TYPE: &str = "affiliation.approved";

/// Event type identifier for [`AffiliationRejected`].
pub const AFFILIATION_REJECTED_EVENT_TYPE: &str = "affiliation.rejected";

/// Event payload variants for the Zone Affiliation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffiliationEventKind {
    /// A zone asked to join.
    AffiliationSubmitted(AffiliationSubmitted),
    /// The request was approved.
    AffiliationApproved(AffiliationApproved),
    /// The request was rejected.
    AffiliationRejected(AffiliationRejected),
}

/// Domain event envelope for the Zone Affiliation context.
#[derive(Debug, Clone, PartialEq)]
pub struct AffiliationEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Domain time of the event.
    pub occurred_at: DateTime<Utc>,
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: AffiliationEventKind,
}

impl AffiliationEvent {
    /// Rebuilds an affiliation event from its wire envelope.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload is not an
    /// [`AffiliationEventKind`].
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

impl DomainEvent for AffiliationEvent {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn event_type(&self) -> &'static str {
        match &self.kind {
            AffiliationEventKind::AffiliationSubmitted(_) => AFFILIATION_SUBMITTED_EVENT_TYPE,
            AffiliationEventKind::AffiliationApproved(_) => AFFILIATION_APPROVED_EVENT_TYPE,
            AffiliationEventKind::AffiliationRejected(_) => AFFILIATION_REJECTED_EVENT_TYPE,
        }
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_envelope_preserves_event_through_wire_form() {
        // Arrange
        let occurred_at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let event = AffiliationEvent {
            event_id: Uuid::new_v4(),
            occurred_at,
            metadata: EventMetadata::new("ZoneAffiliation", "AFI-1", 2)
                .with_partition_key("ZON-1")
                .with_caused_by("USR-admin"),
            kind: AffiliationEventKind::AffiliationApproved(AffiliationApproved {
                affiliation_id: "AFI-1".to_owned(),
                zone_id: "ZON-1".to_owned(),
                requester_id: "USR-1".to_owned(),
                decided_by: "USR-admin".to_owned(),
                notes: Some("ok".to_owned()),
            }),
        };

        // Act
        let envelope = event.to_envelope().unwrap();
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded = AffiliationEvent::from_envelope(EventEnvelope::from_slice(&bytes).unwrap())
            .unwrap();

        // Assert
        assert_eq!(envelope.event_type, AFFILIATION_APPROVED_EVENT_TYPE);
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_from_envelope_rejects_foreign_payload() {
        let envelope = EventEnvelope {
            event_id: Uuid::new_v4(),
            event_type: "user.registered".to_owned(),
            occurred_at: Utc::now(),
            meta: EventMetadata::new("User", "USR-1", 1),
            payload: serde_json::json!({ "UserRegistered": { "user_id": "USR-1" } }),
        };

        assert!(AffiliationEvent::from_envelope(envelope).is_err());
    }
}
