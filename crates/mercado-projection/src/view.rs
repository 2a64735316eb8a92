//! The affiliation read model and its versioning rule.

use chrono::{DateTime, Utc};
use mercado_affiliation::domain::aggregates::AffiliationStatus;
use mercado_affiliation::domain::events::{
    AffiliationEvent, AffiliationEventKind, AffiliationSubmitted,
};
use mercado_core::event::EventEnvelope;
use mercado_core::projection::ReadModel;
use serde::Serialize;

use crate::projector::{Projection, ProjectionError, require_view};

/// Denormalised view of one zone affiliation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffiliationView {
    /// The affiliation identifier.
    pub id: String,
    /// The zone asking to join.
    pub zone_id: String,
    /// The user who filed the request.
    pub requester_id: String,
    /// Hamlet (vereda) name.
    pub hamlet_name: String,
    /// Municipality of the hamlet.
    pub municipality: String,
    /// Zone contact phone.
    pub contact_phone: Option<String>,
    /// Zone contact email.
    pub contact_email: Option<String>,
    /// Representative full name.
    pub representative_name: String,
    /// Representative identity document.
    pub representative_document: String,
    /// Representative email.
    pub representative_email: String,
    /// Current request state.
    pub state: AffiliationStatus,
    /// When the request was filed.
    pub submitted_at: DateTime<Utc>,
    /// When the request was first decided.
    pub decided_at: Option<DateTime<Utc>>,
    /// Administrator who decided.
    pub decided_by: Option<String>,
    /// Notes attached to the decision.
    pub decision_notes: Option<String>,
    /// Aggregate version of the last applied event.
    pub version: i64,
    /// When the projector last wrote this view.
    pub updated_at: DateTime<Utc>,
}

impl AffiliationView {
    /// Builds the initial `Pending` view from a submission.
    #[must_use]
    pub fn seed(
        submitted: &AffiliationSubmitted,
        version: i64,
        occurred_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let details = &submitted.details;
        Self {
            id: submitted.affiliation_id.clone(),
            zone_id: submitted.zone_id.clone(),
            requester_id: submitted.requester_id.clone(),
            hamlet_name: details.hamlet_name.clone(),
            municipality: details.municipality.clone(),
            contact_phone: details.contact.phone.clone(),
            contact_email: details.contact.email.clone(),
            representative_name: details.representative.name.clone(),
            representative_document: details.representative.document.clone(),
            representative_email: details.representative.email.clone(),
            state: AffiliationStatus::Pending,
            submitted_at: occurred_at,
            decided_at: None,
            decided_by: None,
            decision_notes: None,
            version,
            updated_at: now,
        }
    }

    /// Records a decision on this view.
    ///
    /// `decided_at` keeps the first decision time if one is already set.
    pub fn decide(
        &mut self,
        state: AffiliationStatus,
        decided_by: &str,
        notes: Option<String>,
        occurred_at: DateTime<Utc>,
        version: i64,
        now: DateTime<Utc>,
    ) {
        self.state = state;
        self.decided_at.get_or_insert(occurred_at);
        self.decided_by = Some(decided_by.to_owned());
        self.decision_notes = notes;
        self.version = version;
        self.updated_at = now;
    }
}

impl ReadModel for AffiliationView {
    fn key(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

/// Zone affiliation events into [`AffiliationView`].
#[derive(Debug)]
pub struct AffiliationProjection;

impl Projection for AffiliationProjection {
    type Event = AffiliationEvent;
    type View = AffiliationView;

    const NAME: &'static str = "affiliation-projection";

    fn decode(envelope: EventEnvelope) -> Result<AffiliationEvent, serde_json::Error> {
        AffiliationEvent::from_envelope(envelope)
    }

    fn next_view(
        current: Option<AffiliationView>,
        event: &AffiliationEvent,
        now: DateTime<Utc>,
    ) -> Result<AffiliationView, ProjectionError> {
        let version = event.metadata.version();
        let (state, decided_by, notes) = match &event.kind {
            AffiliationEventKind::AffiliationSubmitted(submitted) => {
                return Ok(AffiliationView::seed(submitted, version, event.occurred_at, now));
            }
            AffiliationEventKind::AffiliationApproved(approved) => {
                (AffiliationStatus::Approved, &approved.decided_by, &approved.notes)
            }
            AffiliationEventKind::AffiliationRejected(rejected) => {
                (AffiliationStatus::Rejected, &rejected.decided_by, &rejected.notes)
            }
        };
        let mut view = require_view(current, event)?;
        view.decide(state, decided_by, notes.clone(), event.occurred_at, version, now);
        Ok(view)
    }
}

/// Whether an event at `version` may overwrite `current`.
///
/// An absent view accepts anything. Equal versions are accepted so that a
/// redelivered event whose ledger entry was lost still lands; the ledger is
/// what deduplicates.
#[must_use]
pub fn is_newer<V: ReadModel>(current: Option<&V>, version: i64) -> bool {
    current.is_none_or(|view| version >= view.version())
}
