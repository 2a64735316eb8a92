//! In-memory command store: aggregate state plus outbox behind one lock.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercado_core::aggregate::AggregateRoot;
use mercado_core::error::DomainError;
use mercado_core::outbox::{
    ClaimRequest, DeliveryOutcome, NewOutboxRecord, OutboxRecord, OutboxStatus, OutboxStore,
};
use mercado_core::repository::AggregateRepository;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Inner {
    states: HashMap<(String, String), (i64, serde_json::Value)>,
    outbox: Vec<OutboxRecord>,
    leases: HashMap<i64, (String, DateTime<Utc>)>,
    next_id: i64,
    fail_outbox_writes: bool,
}

/// An in-memory stand-in for the Postgres command store.
///
/// Implements [`AggregateRepository`] for every aggregate type and
/// [`OutboxStore`] over the same data. A save either applies completely or
/// not at all, which makes it usable for co-location tests.
#[derive(Debug, Default)]
pub struct InMemoryCommandStore {
    inner: Mutex<Inner>,
}

impl InMemoryCommandStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail at the outbox-write step.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_outbox_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_outbox_writes = fail;
    }

    /// Snapshot of every outbox row, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn outbox_records(&self) -> Vec<OutboxRecord> {
        self.inner.lock().unwrap().outbox.clone()
    }

    /// Number of persisted aggregate states.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn state_count(&self) -> usize {
        self.inner.lock().unwrap().states.len()
    }

    /// Owner currently holding the lease on a row, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn lease_owner(&self, record_id: i64) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .leases
            .get(&record_id)
            .map(|(owner, _)| owner.clone())
    }

    /// Inserts a row directly, bypassing any aggregate.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert_outbox(&self, record: NewOutboxRecord) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        push_record(&mut inner, record)
    }
}

fn push_record(inner: &mut Inner, record: NewOutboxRecord) -> i64 {
    inner.next_id += 1;
    let id = inner.next_id;
    inner.outbox.push(OutboxRecord {
        id,
        event_id: record.event_id,
        event_type: record.event_type,
        payload: record.payload,
        aggregate_id: record.aggregate_id,
        partition_key: record.partition_key,
        status: OutboxStatus::Pending,
        attempts: 0,
        occurred_at: record.occurred_at,
        created_at: record.occurred_at,
        sent_at: None,
        next_attempt_at: None,
        last_error: None,
    });
    id
}

#[async_trait]
impl<A> AggregateRepository<A> for InMemoryCommandStore
where
    A: AggregateRoot + 'static,
{
    async fn load(&self, aggregate_id: &str) -> Result<Option<A>, DomainError> {
        let value = {
            let inner = self.inner.lock().unwrap();
            inner
                .states
                .get(&(A::AGGREGATE_TYPE.to_owned(), aggregate_id.to_owned()))
                .map(|(_, state)| state.clone())
        };
        value
            .map(|state| {
                serde_json::from_value::<A::State>(state)
                    .map(A::rehydrate)
                    .map_err(|e| DomainError::Infrastructure(format!("state decode failed: {e}")))
            })
            .transpose()
    }

    async fn save(&self, aggregate: &mut A) -> Result<(), DomainError> {
        let records = aggregate
            .pending_events()
            .iter()
            .map(NewOutboxRecord::from_event)
            .collect::<Result<Vec<_>, _>>()?;
        let state = serde_json::to_value(aggregate.to_state())
            .map_err(|e| DomainError::Infrastructure(format!("state encode failed: {e}")))?;
        let key = (A::AGGREGATE_TYPE.to_owned(), aggregate.aggregate_id().to_owned());
        let expected = aggregate.persisted_version();

        {
            let mut inner = self.inner.lock().unwrap();
            let actual = inner.states.get(&key).map_or(0, |(version, _)| *version);
            if actual != expected {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: key.1,
                    expected,
                    actual,
                });
            }
            if inner.fail_outbox_writes && !records.is_empty() {
                return Err(DomainError::Infrastructure("outbox insert failed".into()));
            }
            for (i, record) in records.iter().enumerate() {
                let clashes_with_stored = inner.outbox.iter().any(|r| r.event_id == record.event_id);
                let clashes_in_batch = records[..i].iter().any(|r| r.event_id == record.event_id);
                if clashes_with_stored || clashes_in_batch {
                    return Err(DomainError::Infrastructure(format!(
                        "duplicate outbox event_id {}",
                        record.event_id
                    )));
                }
            }

            inner.states.insert(key, (aggregate.version(), state));
            for record in records {
                push_record(&mut inner, record);
            }
        }

        aggregate.take_events();
        Ok(())
    }
}

fn is_claimable(inner: &Inner, record: &OutboxRecord, now: DateTime<Utc>) -> bool {
    let due = match record.status {
        OutboxStatus::Pending => true,
        OutboxStatus::Failed => record.next_attempt_at.is_none_or(|at| at <= now),
        OutboxStatus::Sent | OutboxStatus::DeadLettered => false,
    };
    let lease_free = inner
        .leases
        .get(&record.id)
        .is_none_or(|(_, until)| *until <= now);
    due && lease_free
}

#[async_trait]
impl OutboxStore for InMemoryCommandStore {
    async fn claim_batch(&self, request: &ClaimRequest) -> Result<Vec<OutboxRecord>, DomainError> {
        let mut inner = self.inner.lock().unwrap();
        let mut claimable: Vec<OutboxRecord> = inner
            .outbox
            .iter()
            .filter(|r| is_claimable(&inner, r, request.now))
            .cloned()
            .collect();
        claimable.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        claimable.truncate(usize::try_from(request.limit).unwrap_or(0));
        for record in &claimable {
            inner
                .leases
                .insert(record.id, (request.owner.clone(), request.lease_until));
        }
        Ok(claimable)
    }

    async fn complete_batch(
        &self,
        owner: &str,
        outcomes: &[DeliveryOutcome],
    ) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().unwrap();
        for outcome in outcomes {
            let id = outcome.record_id();
            let held = inner
                .leases
                .get(&id)
                .is_some_and(|(lease_owner, _)| lease_owner == owner);
            if !held {
                continue;
            }
            inner.leases.remove(&id);
            let Some(record) = inner.outbox.iter_mut().find(|r| r.id == id) else {
                continue;
            };
            match outcome {
                DeliveryOutcome::Sent { sent_at, .. } => {
                    record.status = OutboxStatus::Sent;
                    record.sent_at = Some(*sent_at);
                    record.last_error = None;
                    record.next_attempt_at = None;
                }
                DeliveryOutcome::Failed {
                    error,
                    next_attempt_at,
                    ..
                } => {
                    record.status = OutboxStatus::Failed;
                    record.attempts += 1;
                    record.last_error = Some(error.clone());
                    record.next_attempt_at = Some(*next_attempt_at);
                }
                DeliveryOutcome::DeadLettered { error, .. } => {
                    record.status = OutboxStatus::DeadLettered;
                    record.attempts += 1;
                    record.last_error = Some(error.clone());
                    record.next_attempt_at = None;
                }
            }
        }
        Ok(())
    }

    async fn find_by_event_id(&self, event_id: Uuid) -> Result<Option<OutboxRecord>, DomainError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.outbox.iter().find(|r| r.event_id == event_id).cloned())
    }

    async fn requeue(&self, event_id: Uuid) -> Result<bool, DomainError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(record) = inner
            .outbox
            .iter_mut()
            .find(|r| r.event_id == event_id && r.status == OutboxStatus::DeadLettered)
        else {
            return Ok(false);
        };
        record.status = OutboxStatus::Pending;
        record.attempts = 0;
        record.next_attempt_at = None;
        Ok(true)
    }

    async fn replay(&self, event_id: Uuid) -> Result<bool, DomainError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(record) = inner
            .outbox
            .iter_mut()
            .find(|r| r.event_id == event_id && r.status == OutboxStatus::Sent)
        else {
            return Ok(false);
        };
        record.status = OutboxStatus::Pending;
        record.attempts = 0;
        record.sent_at = None;
        record.next_attempt_at = None;
        Ok(true)
    }
}
