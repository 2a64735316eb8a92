//! Aggregate roots for the Zone Affiliation context.

use std::fmt;

use chrono::{DateTime, Utc};
use mercado_core::aggregate::AggregateRoot;
use mercado_core::error::DomainError;
use mercado_core::event::EventMetadata;
use mercado_core::event_factory::EventFactory;
use mercado_core::validation::{MAX_ID_LEN, require_within};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::details::ZoneDetails;
use super::events::{
    AffiliationApproved, AffiliationEvent, AffiliationEventKind, AffiliationRejected,
    AffiliationSubmitted,
};

/// Prefix of affiliation identifiers.
pub const AFFILIATION_ID_PREFIX: &str = "AFI-";

/// Prefix of zone identifiers.
pub const ZONE_ID_PREFIX: &str = "ZON-";

/// Generates a fresh affiliation identifier.
#[must_use]
pub fn new_affiliation_id() -> String {
    format!("{AFFILIATION_ID_PREFIX}{}", Uuid::new_v4())
}

/// Generates a fresh zone identifier.
#[must_use]
pub fn new_zone_id() -> String {
    format!("{ZONE_ID_PREFIX}{}", Uuid::new_v4())
}

/// Lifecycle of an affiliation request. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AffiliationStatus {
    /// Awaiting a decision.
    Pending,
    /// Approved by a global administrator.
    Approved,
    /// Rejected by a global administrator.
    Rejected,
}

impl AffiliationStatus {
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
                "unknown affiliation status: {other}"
            ))),
        }
    }
}

impl fmt::Display for AffiliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of a [`ZoneAffiliation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneAffiliationState {
    /// Aggregate identifier (`AFI-…`).
    pub id: String,
    /// Zone identifier (`ZON-…`), also the partition key.
    pub zone_id: String,
    /// The user who filed the request.
    pub requester_id: String,
    /// Zone data supplied with the request.
    pub details: ZoneDetails,
    /// Current lifecycle status.
    pub status: AffiliationStatus,
    /// Administrator who decided, once decided.
    pub decided_by: Option<String>,
    /// Decision notes, once decided.
    pub decision_notes: Option<String>,
    /// Current version.
    pub version: i64,
    /// Domain time of the last emitted event.
    pub last_event_at: DateTime<Utc>,
}

/// The aggregate root for a zone affiliation request.
#[derive(Debug)]
pub struct ZoneAffiliation {
    state: ZoneAffiliationState,
    /// Events emitted since the last save.
    pending_events: Vec<AffiliationEvent>,
}

impl ZoneAffiliation {
    /// Files a new affiliation request in `Pending` at version 1.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the requester is blank or too
    /// long, or the zone details are incomplete.
    pub fn submit(
        id: String,
        zone_id: String,
        requester_id: &str,
        details: ZoneDetails,
        correlation_id: Uuid,
        factory: &dyn EventFactory,
    ) -> Result<Self, DomainError> {
        require_within("requester_id", requester_id, MAX_ID_LEN)?;
        details.validate()?;

        let now = factory.now();
        let mut affiliation = Self {
            state: ZoneAffiliationState {
                id,
                zone_id,
                requester_id: requester_id.to_owned(),
                details,
                status: AffiliationStatus::Pending,
                decided_by: None,
                decision_notes: None,
                version: 1,
                last_event_at: now,
            },
            pending_events: Vec::new(),
        };

        let kind = AffiliationEventKind::AffiliationSubmitted(AffiliationSubmitted {
            affiliation_id: affiliation.state.id.clone(),
            zone_id: affiliation.state.zone_id.clone(),
            requester_id: affiliation.state.requester_id.clone(),
            details: affiliation.state.details.clone(),
        });
        affiliation.record(kind, requester_id, correlation_id, now, factory);
        Ok(affiliation)
    }

    /// Approves a pending request.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless the request is
    /// `Pending`, and `DomainError::Validation` if `admin_id` is blank.
    pub fn approve(
        &mut self,
        admin_id: &str,
        notes: Option<String>,
        correlation_id: Uuid,
        factory: &dyn EventFactory,
    ) -> Result<(), DomainError> {
        self.decide(AffiliationStatus::Approved, admin_id, notes, correlation_id, factory)
    }

    /// Rejects a pending request.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless the request is
    /// `Pending`, and `DomainError::Validation` if `admin_id` is blank.
    pub fn reject(
        &mut self,
        admin_id: &str,
        notes: Option<String>,
        correlation_id: Uuid,
        factory: &dyn EventFactory,
    ) -> Result<(), DomainError> {
        self.decide(AffiliationStatus::Rejected, admin_id, notes, correlation_id, factory)
    }

    fn decide(
        &mut self,
        outcome: AffiliationStatus,
        admin_id: &str,
        notes: Option<String>,
        correlation_id: Uuid,
        factory: &dyn EventFactory,
    ) -> Result<(), DomainError> {
        let action = match outcome {
            AffiliationStatus::Approved => "approve",
            _ => "reject",
        };
        if self.state.status != AffiliationStatus::Pending {
            return Err(DomainError::InvalidTransition {
                aggregate_id: self.state.id.clone(),
                from: self.state.status.to_string(),
                action,
            });
        }
        require_within("admin_id", admin_id, MAX_ID_LEN)?;

        // Domain time never goes backwards within one aggregate.
        let now = factory.now().max(self.state.last_event_at);

        self.state.status = outcome;
        self.state.decided_by = Some(admin_id.to_owned());
        self.state.decision_notes.clone_from(&notes);
        self.state.version += 1;
        self.state.last_event_at = now;

        let affiliation_id = self.state.id.clone();
        let zone_id = self.state.zone_id.clone();
        let requester_id = self.state.requester_id.clone();
        let decided_by = admin_id.to_owned();
        let kind = if outcome == AffiliationStatus::Approved {
            AffiliationEventKind::AffiliationApproved(AffiliationApproved {
                affiliation_id,
                zone_id,
                requester_id,
                decided_by,
                notes,
            })
        } else {
            AffiliationEventKind::AffiliationRejected(AffiliationRejected {
                affiliation_id,
                zone_id,
                requester_id,
                decided_by,
                notes,
            })
        };
        self.record(kind, admin_id, correlation_id, now, factory);
        Ok(())
    }

    fn record(
        &mut self,
        kind: AffiliationEventKind,
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
        self.pending_events.push(AffiliationEvent {
            event_id: factory.next_event_id(),
            occurred_at,
            metadata,
            kind,
        });
    }

    /// The zone identifier.
    #[must_use]
    pub fn zone_id(&self) -> &str {
        &self.state.zone_id
    }

    /// The requesting user.
    #[must_use]
    pub fn requester_id(&self) -> &str {
        &self.state.requester_id
    }

    /// Zone data supplied with the request.
    #[must_use]
    pub fn details(&self) -> &ZoneDetails {
        &self.state.details
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> AffiliationStatus {
        self.state.status
    }

    /// Administrator who decided, once decided.
    #[must_use]
    pub fn decided_by(&self) -> Option<&str> {
        self.state.decided_by.as_deref()
    }

    /// Decision notes.
    #[must_use]
    pub fn decision_notes(&self) -> Option<&str> {
        self.state.decision_notes.as_deref()
    }
}

impl AggregateRoot for ZoneAffiliation {
    type Event = AffiliationEvent;
    type State = ZoneAffiliationState;

    const AGGREGATE_TYPE: &'static str = "ZoneAffiliation";

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
