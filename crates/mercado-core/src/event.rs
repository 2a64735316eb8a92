//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provenance of a domain event.
///
/// Built once by the emitting aggregate and never mutated afterwards; the
/// fields are only reachable through getters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    aggregate_type: String,
    aggregate_id: String,
    #[serde(default)]
    partition_key: Option<String>,
    version: i64,
    #[serde(default)]
    caused_by: Option<String>,
    #[serde(default)]
    correlation_id: Option<String>,
    #[serde(default)]
    causation_id: Option<String>,
}

impl EventMetadata {
    /// Creates metadata for the event that moved `aggregate_id` to `version`.
    #[must_use]
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        version: i64,
    ) -> Self {
        debug_assert!(version >= 1, "event versions start at 1");
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            partition_key: None,
            version,
            caused_by: None,
            correlation_id: None,
            causation_id: None,
        }
    }

    /// Sets the partition key used for routing and filtering.
    #[must_use]
    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    /// Sets the actor that caused the event.
    #[must_use]
    pub fn with_caused_by(mut self, actor_id: impl Into<String>) -> Self {
        self.caused_by = Some(actor_id.into());
        self
    }

    /// Sets the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Sets the causation ID.
    #[must_use]
    pub fn with_causation_id(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }

    /// The aggregate type name, e.g. `ZoneAffiliation`.
    #[must_use]
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// The aggregate identifier.
    #[must_use]
    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    /// The partition key, if any.
    #[must_use]
    pub fn partition_key(&self) -> Option<&str> {
        self.partition_key.as_deref()
    }

    /// The version the aggregate reached after applying the event.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// The actor that caused the event.
    #[must_use]
    pub fn caused_by(&self) -> Option<&str> {
        self.caused_by.as_deref()
    }

    /// Correlation ID for tracing a command through its effects.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Causation ID linking the event to whatever caused it.
    #[must_use]
    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }
}

/// Transport-agnostic wire form of a domain event.
///
/// This is what the outbox stores and what the transport carries. The
/// `payload` holds the variant-specific fields; consumers dispatch on
/// `event_type` to decode it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Stable event type name.
    pub event_type: String,
    /// Domain time of the event.
    pub occurred_at: DateTime<Utc>,
    /// Event provenance.
    pub meta: EventMetadata,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Decodes an envelope from transport bytes.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the bytes are not a valid envelope.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Trait that all domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Globally unique event identifier.
    fn event_id(&self) -> Uuid;

    /// Domain time at which the event occurred.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Returns the event type name (used for routing and decoding).
    fn event_type(&self) -> &'static str;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;

    /// Serializes the variant-specific payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload cannot be serialized.
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Builds the wire envelope for this event.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload cannot be serialized.
    fn to_envelope(&self) -> Result<EventEnvelope, serde_json::Error> {
        Ok(EventEnvelope {
            event_id: self.event_id(),
            event_type: self.event_type().to_owned(),
            occurred_at: self.occurred_at(),
            meta: self.metadata().clone(),
            payload: self.to_payload()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_metadata_builder_sets_optional_fields() {
        let meta = EventMetadata::new("ZoneAffiliation", "AFI-1", 2)
            .with_partition_key("ZON-1")
            .with_caused_by("USR-admin")
            .with_correlation_id("corr")
            .with_causation_id("cause");

        assert_eq!(meta.aggregate_type(), "ZoneAffiliation");
        assert_eq!(meta.aggregate_id(), "AFI-1");
        assert_eq!(meta.partition_key(), Some("ZON-1"));
        assert_eq!(meta.version(), 2);
        assert_eq!(meta.caused_by(), Some("USR-admin"));
        assert_eq!(meta.correlation_id(), Some("corr"));
        assert_eq!(meta.causation_id(), Some("cause"));
    }

    #[test]
    fn test_envelope_decodes_when_optional_metadata_is_missing() {
        let occurred_at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let json = serde_json::json!({
            "event_id": Uuid::nil(),
            "event_type": "affiliation.approved",
            "occurred_at": occurred_at,
            "meta": {
                "aggregate_type": "ZoneAffiliation",
                "aggregate_id": "AFI-1",
                "version": 2
            },
            "payload": {}
        });

        let envelope = EventEnvelope::from_slice(&serde_json::to_vec(&json).unwrap()).unwrap();

        assert_eq!(envelope.meta.version(), 2);
        assert_eq!(envelope.meta.partition_key(), None);
        assert_eq!(envelope.occurred_at, occurred_at);
    }
}
