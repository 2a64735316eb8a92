//! The producer application read model.

use chrono::{DateTime, Utc};
use mercado_core::event::EventEnvelope;
use mercado_core::projection::ReadModel;
use mercado_producers::domain::aggregates::ApplicationStatus;
use mercado_producers::domain::events::{
    ProducerApplicationEvent, ProducerApplicationEventKind, ProducerApplicationSubmitted,
};
use serde::Serialize;

use crate::projector::{Projection, ProjectionError, require_view};

/// Denormalised view of one producer application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProducerApplicationView {
    /// The application identifier.
    pub id: String,
    /// The zone applied to.
    pub zone_id: String,
    /// The applying user.
    pub producer_id: String,
    /// Producer or farm name.
    pub producer_name: String,
    /// Identity document.
    pub document: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// What the producer grows or makes.
    pub product_types: Option<String>,
    /// Current application state.
    pub state: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    pub decision_notes: Option<String>,
    /// Aggregate version of the last applied event.
    pub version: i64,
    /// When the projector last wrote this view.
    pub updated_at: DateTime<Utc>,
}

impl ProducerApplicationView {
    /// Builds the initial `Pending` view from a submission.
    #[must_use]
    pub fn seed(
        submitted: &ProducerApplicationSubmitted,
        version: i64,
        occurred_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let profile = &submitted.profile;
        Self {
            id: submitted.application_id.clone(),
            zone_id: submitted.zone_id.clone(),
            producer_id: submitted.producer_id.clone(),
            producer_name: profile.producer_name.clone(),
            document: profile.document.clone(),
            phone: profile.phone.clone(),
            email: profile.email.clone(),
            address: profile.address.clone(),
            product_types: profile.product_types.clone(),
            state: ApplicationStatus::Pending,
            submitted_at: occurred_at,
            decided_at: None,
            decided_by: None,
            decision_notes: None,
            version,
            updated_at: now,
        }
    }

    /// Records a decision; `decided_at` keeps the first decision time.
    pub fn decide(
        &mut self,
        state: ApplicationStatus,
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

impl ReadModel for ProducerApplicationView {
    fn key(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

/// Producer application events into [`ProducerApplicationView`].
#[derive(Debug)]
pub struct ProducerApplicationProjection;

impl Projection for ProducerApplicationProjection {
    type Event = ProducerApplicationEvent;
    type View = ProducerApplicationView;

    const NAME: &'static str = "producer-application-projection";

    fn decode(envelope: EventEnvelope) -> Result<ProducerApplicationEvent, serde_json::Error> {
        ProducerApplicationEvent::from_envelope(envelope)
    }

    fn next_view(
        current: Option<ProducerApplicationView>,
        event: &ProducerApplicationEvent,
        now: DateTime<Utc>,
    ) -> Result<ProducerApplicationView, ProjectionError> {
        let version = event.metadata.version();
        let (state, decided_by, notes) = match &event.kind {
            ProducerApplicationEventKind::Submitted(submitted) => {
                return Ok(ProducerApplicationView::seed(
                    submitted,
                    version,
                    event.occurred_at,
                    now,
                ));
            }
            ProducerApplicationEventKind::Approved(approved) => {
                (ApplicationStatus::Approved, &approved.decided_by, &approved.notes)
            }
            ProducerApplicationEventKind::Rejected(rejected) => {
                (ApplicationStatus::Rejected, &rejected.decided_by, &rejected.notes)
            }
        };
        let mut view = require_view(current, event)?;
        view.decide(state, decided_by, notes.clone(), event.occurred_at, version, now);
        Ok(view)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use mercado_producers::domain::events::ProducerApplicationSubmitted;
    use mercado_producers::domain::profile::ProducerProfile;

    pub(crate) fn application_submitted(application_id: &str) -> ProducerApplicationSubmitted {
        ProducerApplicationSubmitted {
            application_id: application_id.to_owned(),
            zone_id: "ZON-1".to_owned(),
            producer_id: "USR-7".to_owned(),
            profile: ProducerProfile {
                producer_name: "Finca El Roble".to_owned(),
                document: "52000111".to_owned(),
                phone: Some("3105550000".to_owned()),
                email: None,
                address: Some("Vereda La Esperanza, km 3".to_owned()),
                product_types: Some("café".to_owned()),
            },
        }
    }
}
