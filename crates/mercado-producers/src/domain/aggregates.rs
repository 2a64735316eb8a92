//! Aggregate root for the Producer Application context.

use std::fmt;

use chrono::{DateTime, Utc};
use mercado_core::aggregate::AggregateRoot;
use mercado_core::error::DomainError;
use mercado_core::event::EventMetadata;
use mercado_core::event_factory::EventFactory;
use mercado_core::validation::{MAX_ID_LEN, require_within};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    ProducerApplicationApproved, ProducerApplicationEvent, ProducerApplicationEventKind,
    ProducerApplicationRejected, ProducerApplicationSubmitted,
};
use super::profile::ProducerProfile;

/// Prefix of producer application identifiers.
pub const APPLICATION_ID_PREFIX: &str = "PAP-";

/// Generates a fresh application identifier.
#[must_use]
pub fn new_application_id() -> String {
    format!("{APPLICATION_ID_PREFIX}{}", Uuid::new_v4())
}

/// Lifecycle of a producer application. Only `Pending` can be decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    /// Awaiting the zone's decision.
    Pending,
    /// Accepted; the producer is a member of the zone.
    Approved,
    /// Turned down.
    Rejected,
}

impl ApplicationStatus {
    /// Stable string form, shared with the read model.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Parses the stable string form.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an unknown status.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(DomainError::Validation(format!(
                "unknown producer application status: {other}"
            ))),
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of a [`ProducerApplication`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerApplicationState {
    /// Aggregate identifier (`PAP-…`).
    pub id: String,
    /// Zone applied to, also the partition key.
    pub zone_id: String,
    /// The applying user.
    pub producer_id: String,
    /// Declared producer data.
    pub profile: ProducerProfile,
    /// Current lifecycle status.
    pub status: ApplicationStatus,
    /// Administrator who decided, once decided.
    pub decided_by: Option<String>,
    /// Decision notes.
    pub decision_notes: Option<String>,
    /// Current version.
    pub version: i64,
    /// Domain time of the last emitted event.
    pub last_event_at: DateTime<Utc>,
}

/// A producer's request to sell through one zone.
#[derive(Debug)]
pub struct ProducerApplication {
    state: ProducerApplicationState,
    pending_events: Vec<ProducerApplicationEvent>,
}

impl ProducerApplication {
    /// Files a new application in `Pending` at version 1.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the producer or zone ID is blank
    /// or too long, or the profile is invalid.
    pub fn submit(
        id: String,
        zone_id: &str,
        producer_id: &str,
        profile: ProducerProfile,
        correlation_id: Uuid,
        factory: &dyn EventFactory,
    ) -> Result<Self, DomainError> {
        require_within("producer_id", producer_id, MAX_ID_LEN)?;
        require_within("zone_id", zone_id, MAX_ID_LEN)?;
        profile.validate()?;

        let now = factory.now();
        let mut application = Self {
            state: ProducerApplicationState {
                id,
                zone_id: zone_id.to_owned(),
                producer_id: producer_id.to_owned(),
                profile,
                status: ApplicationStatus::Pending,
                decided_by: None,
                decision_notes: None,
                version: 1,
                last_event_at: now,
            },
            pending_events: Vec::new(),
        };
        let kind = ProducerApplicationEventKind::Submitted(ProducerApplicationSubmitted {
            application_id: application.state.id.clone(),
            zone_id: application.state.zone_id.clone(),
            producer_id: application.state.producer_id.clone(),
            profile: application.state.profile.clone(),
        });
        application.record(kind, producer_id, correlation_id, now, factory);
        Ok(application)
    }

    /// Accepts a pending application.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless the application is
    /// `Pending`, and `DomainError::Validation` for a bad `admin_id`.
    pub fn approve(
        &mut self,
        admin_id: &str,
        notes: Option<String>,
        correlation_id: Uuid,
        factory: &dyn EventFactory,
    ) -> Result<(), DomainError> {
        self.decide(ApplicationStatus::Approved, admin_id, notes, correlation_id, factory)
    }

    /// Turns down a pending application.
    ///
    /// # Errors
    ///
    /// Same as [`approve`](Self::approve).
    pub fn reject(
        &mut self,
        admin_id: &str,
        notes: Option<String>,
        correlation_id: Uuid,
        factory: &dyn EventFactory,
    ) -> Result<(), DomainError> {
        self.decide(ApplicationStatus::Rejected, admin_id, notes, correlation_id, factory)
    }

    fn decide(
        &mut self,
        outcome: ApplicationStatus,
        admin_id: &str,
        notes: Option<String>,
        correlation_id: Uuid,
        factory: &dyn EventFactory,
    ) -> Result<(), DomainError> {
        if self.state.status != ApplicationStatus::Pending {
            return Err(DomainError::InvalidTransition {
                aggregate_id: self.state.id.clone(),
                from: self.state.status.to_string(),
                action: if outcome == ApplicationStatus::Approved {
                    "approve"
                } else {
                    "reject"
                },
            });
        }
        require_within("admin_id", admin_id, MAX_ID_LEN)?;

        let now = factory.now().max(self.state.last_event_at);
        self.state.status = outcome;
        self.state.decided_by = Some(admin_id.to_owned());
        self.state.decision_notes.clone_from(&notes);
        self.state.version += 1;
        self.state.last_event_at = now;

        let application_id = self.state.id.clone();
        let zone_id = self.state.zone_id.clone();
        let producer_id = self.state.producer_id.clone();
        let decided_by = admin_id.to_owned();
        let kind = if outcome == ApplicationStatus::Approved {
            ProducerApplicationEventKind::Approved(ProducerApplicationApproved {
                application_id,
                zone_id,
                producer_id,
                decided_by,
                notes,
            })
        } else {
            ProducerApplicationEventKind::Rejected(ProducerApplicationRejected {
                application_id,
                zone_id,
                producer_id,
                decided_by,
                notes,
            })
        };
        self.record(kind, admin_id, correlation_id, now, factory);
        Ok(())
    }

    fn record(
        &mut self,
        kind: ProducerApplicationEventKind,
        caused_by: &str,
        correlation_id: Uuid,
        occurred_at: DateTime<Utc>,
        factory: &dyn EventFactory,
    ) {
        let metadata =
            EventMetadata::new(Self::AGGREGATE_TYPE, &self.state.id, self.state.version)
                .with_partition_key(&self.state.zone_id)
                .with_caused_by(caused_by)
                .with_correlation_id(correlation_id.to_string());
        self.pending_events.push(ProducerApplicationEvent {
            event_id: factory.next_event_id(),
            occurred_at,
            metadata,
            kind,
        });
    }

    /// The zone applied to.
    #[must_use]
    pub fn zone_id(&self) -> &str {
        &self.state.zone_id
    }

    /// The applying user.
    #[must_use]
    pub fn producer_id(&self) -> &str {
        &self.state.producer_id
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> ApplicationStatus {
        self.state.status
    }

    /// Administrator who decided.
    #[must_use]
    pub fn decided_by(&self) -> Option<&str> {
        self.state.decided_by.as_deref()
    }
}

impl AggregateRoot for ProducerApplication {
    type Event = ProducerApplicationEvent;
    type State = ProducerApplicationState;

    const AGGREGATE_TYPE: &'static str = "ProducerApplication";

    fn aggregate_id(&self) -> &str {
        &self.state.id
    }

    fn version(&self) -> i64 {
        self.state.version
    }

    fn pending_events(&self) -> &[Self::Event] {
        &self.pending_events
    }

    fn take_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.pending_events)
    }

    fn to_state(&self) -> Self::State {
        self.state.clone()
    }

    fn rehydrate(state: Self::State) -> Self {
        Self {
            state,
            pending_events: Vec::new(),
        }
    }
}
