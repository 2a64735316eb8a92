//! Command-side repository abstraction.

use async_trait::async_trait;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;

/// Loads and saves aggregates of type `A`.
///
/// `save` writes the aggregate's state and one outbox record per pending
/// event in a single atomic transaction, then drains the aggregate's event
/// buffer. If the transaction fails nothing is written and the buffer is
/// left untouched.
#[async_trait]
pub trait AggregateRepository<A: AggregateRoot>: Send + Sync {
    /// Loads an aggregate by ID, or `None` if it was never saved.
    async fn load(&self, aggregate_id: &str) -> Result<Option<A>, DomainError>;

    /// Persists the aggregate state together with its pending events.
    ///
    /// Fails with `DomainError::ConcurrencyConflict` if another writer moved
    /// the stored version past [`AggregateRoot::persisted_version`].
    async fn save(&self, aggregate: &mut A) -> Result<(), DomainError>;
}
