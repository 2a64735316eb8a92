//! Applies events to a read model exactly once in effect.
//!
//! [`Projector`] owns the ledger check, the version rule and the commit; a
//! [`Projection`] supplies only how one event changes one view.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mercado_core::clock::Clock;
use mercado_core::error::DomainError;
use mercado_core::event::{DomainEvent, EventEnvelope};
use mercado_core::projection::{CommitOutcome, ProcessedEvent, ProjectionStore, ReadModel};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::producer_view::ProducerApplicationProjection;
use crate::view::{AffiliationProjection, is_newer};

/// What the projector did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// The view was written and the event recorded.
    Applied,
    /// The view already reflects a later version; only the ledger was written.
    Stale,
    /// The event had already been handled; nothing was written.
    Duplicate,
}

/// Failure while projecting an event. None of these write the ledger.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// A decision arrived for an aggregate the read model has never seen.
    #[error("no view for {aggregate_id}, cannot apply {event_type}")]
    MissingView {
        /// The aggregate the event belongs to.
        aggregate_id: String,
        /// The event that could not be applied.
        event_type: &'static str,
    },

    /// The projection store failed.
    #[error("projection store failure: {0}")]
    Store(#[from] DomainError),

    /// The delivery did not carry an event of the projected stream.
    #[error("undecodable event: {0}")]
    Decode(String),
}

impl ProjectionError {
    /// Whether retrying the same event right away may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Whether the event may apply once earlier events have been projected.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::MissingView { .. })
    }
}

/// How one event stream maps onto one read model.
pub trait Projection: Send + Sync + 'static {
    /// Events the projection consumes.
    type Event: DomainEvent;
    /// The view it maintains.
    type View: ReadModel + std::fmt::Debug + 'static;

    /// Consumer name used in logs.
    const NAME: &'static str;

    /// Decodes a wire envelope into [`Self::Event`].
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for a payload of another stream.
    fn decode(envelope: EventEnvelope) -> Result<Self::Event, serde_json::Error>;

    /// The view after `event`. `current` has already passed the version rule.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::MissingView` when the event changes a view
    /// that does not exist yet.
    fn next_view(
        current: Option<Self::View>,
        event: &Self::Event,
        now: DateTime<Utc>,
    ) -> Result<Self::View, ProjectionError>;
}

/// Keeps one read model in step with its event stream.
pub struct Projector<P: Projection> {
    store: Arc<dyn ProjectionStore<P::View>>,
    clock: Arc<dyn Clock>,
    projection: PhantomData<fn() -> P>,
}

/// Projector for `affiliation_views`.
pub type AffiliationProjector = Projector<AffiliationProjection>;

/// Projector for `producer_application_views`.
pub type ProducerApplicationProjector = Projector<ProducerApplicationProjection>;

impl<P: Projection> Projector<P> {
    /// Creates a projector writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ProjectionStore<P::View>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            projection: PhantomData,
        }
    }

    /// Applies one event.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::MissingView` for a decision without a
    /// submitted view and `ProjectionError::Store` when storage fails. In
    /// both cases the ledger is left untouched so a redelivery can retry.
    #[instrument(
        skip(self, event),
        fields(
            projection = P::NAME,
            event_id = %event.event_id(),
            event_type = event.event_type(),
            aggregate_id = %event.metadata().aggregate_id(),
            version = event.metadata().version(),
        )
    )]
    pub async fn apply(&self, event: &P::Event) -> Result<ProjectionOutcome, ProjectionError> {
        let event_id = event.event_id();
        if self.store.is_processed(event_id).await? {
            debug!("event already processed");
            return Ok(ProjectionOutcome::Duplicate);
        }

        let aggregate_id = event.metadata().aggregate_id();
        let version = event.metadata().version();
        let current = self.store.load(aggregate_id).await?;
        let now = self.clock.now();
        let processed = ProcessedEvent {
            event_id,
            aggregate_id: aggregate_id.to_owned(),
            event_type: event.event_type().to_owned(),
            processed_at: now,
        };

        if !is_newer(current.as_ref(), version) {
            debug!(
                view_version = current.as_ref().map(ReadModel::version),
                "stale event, recording without applying"
            );
            return Ok(match self.store.commit(None, &processed).await? {
                CommitOutcome::Committed => ProjectionOutcome::Stale,
                CommitOutcome::AlreadyProcessed => ProjectionOutcome::Duplicate,
            });
        }

        let next = P::next_view(current, event, now)?;

        match self.store.commit(Some(&next), &processed).await? {
            CommitOutcome::Committed => {
                debug!(view_version = next.version(), "view updated");
                Ok(ProjectionOutcome::Applied)
            }
            CommitOutcome::AlreadyProcessed => Ok(ProjectionOutcome::Duplicate),
        }
    }
}

/// Unwraps `current` for an event that only changes an existing view.
///
/// The absence is logged as an alert: the producer emits a decision only
/// after the submission, so a missing view means the submission has not
/// been projected yet or was lost.
///
/// # Errors
///
/// Returns `ProjectionError::MissingView` when `current` is `None`.
pub fn require_view<V, E: DomainEvent>(current: Option<V>, event: &E) -> Result<V, ProjectionError> {
    current.ok_or_else(|| {
        let aggregate_id = event.metadata().aggregate_id().to_owned();
        error!(
            alert = true,
            aggregate_id = %aggregate_id,
            event_id = %event.event_id(),
            event_type = event.event_type(),
            "decision received for an aggregate with no view"
        );
        ProjectionError::MissingView {
            aggregate_id,
            event_type: event.event_type(),
        }
    })
}
