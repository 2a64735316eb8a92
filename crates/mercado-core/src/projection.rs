//! Read-model store abstraction and the processed-event ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// A denormalised view keyed by aggregate ID.
pub trait ReadModel: Clone + Send + Sync {
    /// Aggregate ID the view is keyed by.
    fn key(&self) -> &str;

    /// Version of the last event applied to this view.
    fn version(&self) -> i64;
}

/// Idempotency ledger entry written once per handled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedEvent {
    /// The handled event.
    pub event_id: Uuid,
    /// Aggregate the event belongs to.
    pub aggregate_id: String,
    /// Event type name.
    pub event_type: String,
    /// When the projector handled it.
    pub processed_at: DateTime<Utc>,
}

/// Result of committing a projection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Ledger entry (and view, if any) written.
    Committed,
    /// Another projector recorded this event first; nothing was written.
    AlreadyProcessed,
}

/// Storage for one read model plus its processed-event ledger.
#[async_trait]
pub trait ProjectionStore<V: ReadModel>: Send + Sync {
    /// Whether the ledger already holds `event_id`.
    async fn is_processed(&self, event_id: Uuid) -> Result<bool, DomainError>;

    /// Loads the view for an aggregate.
    async fn load(&self, aggregate_id: &str) -> Result<Option<V>, DomainError>;

    /// Writes the ledger entry and, when `view` is present, upserts the view.
    ///
    /// Implementations either couple both writes in one transaction or write
    /// the view before the ledger, so a failure never leaves a ledger entry
    /// without its effect. A ledger uniqueness conflict yields
    /// [`CommitOutcome::AlreadyProcessed`] and leaves the view untouched.
    async fn commit(
        &self,
        view: Option<&V>,
        processed: &ProcessedEvent,
    ) -> Result<CommitOutcome, DomainError>;
}
