//! Aggregate root abstraction.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::event::DomainEvent;

/// Trait for aggregate roots that buffer the events their operations emit.
///
/// Aggregates never persist themselves. The repository reads
/// [`pending_events`](Self::pending_events) inside its transaction and calls
/// [`take_events`](Self::take_events) exactly once after that transaction
/// commits.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate emits.
    type Event: DomainEvent;

    /// Plain state record written to and read from the command store.
    type State: Serialize + DeserializeOwned + Send + Sync;

    /// Aggregate type name recorded in event metadata and the state table.
    const AGGREGATE_TYPE: &'static str;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &str;

    /// Returns the current version (one per applied state change).
    fn version(&self) -> i64;

    /// Events emitted since the last successful save, oldest first.
    fn pending_events(&self) -> &[Self::Event];

    /// Drains the pending events, leaving the buffer empty.
    fn take_events(&mut self) -> Vec<Self::Event>;

    /// Snapshot of the aggregate's state for persistence.
    fn to_state(&self) -> Self::State;

    /// Rebuilds an aggregate from a persisted state record without emitting
    /// any events.
    fn rehydrate(state: Self::State) -> Self
    where
        Self: Sized;

    /// The version held by the command store before the pending events were
    /// produced. Zero for a never-saved aggregate.
    fn persisted_version(&self) -> i64 {
        let pending = i64::try_from(self.pending_events().len()).unwrap_or(i64::MAX);
        self.version() - pending
    }
}
