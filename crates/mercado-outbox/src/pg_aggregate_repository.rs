//! `PostgreSQL` implementation of the `AggregateRepository` trait.

use std::marker::PhantomData;

use async_trait::async_trait;
use mercado_core::aggregate::AggregateRoot;
use mercado_core::error::DomainError;
use mercado_core::outbox::NewOutboxRecord;
use mercado_core::repository::AggregateRepository;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

pub(crate) fn db_error(e: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(e.to_string())
}

/// Inserts one PENDING outbox row per record inside `tx`.
///
/// # Errors
///
/// Returns the `sqlx` error of the first failing insert, e.g. a unique
/// violation on `event_id`. The caller's transaction must then be dropped.
pub async fn append_outbox(
    tx: &mut Transaction<'_, Postgres>,
    records: &[NewOutboxRecord],
) -> Result<(), sqlx::Error> {
    for record in records {
        sqlx::query(
            r"
            INSERT INTO outbox (
                event_id, event_type, payload, aggregate_id, partition_key,
                status, occurred_at
            ) VALUES ($1, $2, $3, $4, $5, 'PENDING', $6)
            ",
        )
        .bind(record.event_id)
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(&record.aggregate_id)
        .bind(&record.partition_key)
        .bind(record.occurred_at)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// PostgreSQL-backed aggregate repository.
///
/// State is stored as a JSONB snapshot in `aggregate_snapshots`, keyed by
/// aggregate type and ID.
#[derive(Debug)]
pub struct PgAggregateRepository<A> {
    pool: PgPool,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> Clone for PgAggregateRepository<A> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _aggregate: PhantomData,
        }
    }
}

impl<A: AggregateRoot> PgAggregateRepository<A> {
    /// Creates a new `PgAggregateRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _aggregate: PhantomData,
        }
    }

    async fn write_snapshot(
        tx: &mut Transaction<'_, Postgres>,
        aggregate: &A,
        state: &serde_json::Value,
        expected: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = if expected == 0 {
            sqlx::query(
                r"
                INSERT INTO aggregate_snapshots (aggregate_type, aggregate_id, version, state)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (aggregate_type, aggregate_id) DO NOTHING
                ",
            )
            .bind(A::AGGREGATE_TYPE)
            .bind(aggregate.aggregate_id())
            .bind(aggregate.version())
            .bind(state)
            .execute(&mut **tx)
            .await?
        } else {
            sqlx::query(
                r"
                UPDATE aggregate_snapshots
                SET version = $3, state = $4, updated_at = NOW()
                WHERE aggregate_type = $1 AND aggregate_id = $2 AND version = $5
                ",
            )
            .bind(A::AGGREGATE_TYPE)
            .bind(aggregate.aggregate_id())
            .bind(aggregate.version())
            .bind(state)
            .bind(expected)
            .execute(&mut **tx)
            .await?
        };
        Ok(result.rows_affected())
    }

    async fn current_version(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: &str,
    ) -> Result<i64, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT version FROM aggregate_snapshots WHERE aggregate_type = $1 AND aggregate_id = $2",
        )
        .bind(A::AGGREGATE_TYPE)
        .bind(aggregate_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map_or(0, |(version,)| version))
    }
}

#[async_trait]
impl<A> AggregateRepository<A> for PgAggregateRepository<A>
where
    A: AggregateRoot + 'static,
{
    async fn load(&self, aggregate_id: &str) -> Result<Option<A>, DomainError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            "SELECT state FROM aggregate_snapshots WHERE aggregate_type = $1 AND aggregate_id = $2",
        )
        .bind(A::AGGREGATE_TYPE)
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(|(state,)| {
            serde_json::from_value::<A::State>(state)
                .map(A::rehydrate)
                .map_err(|e| {
                    DomainError::Infrastructure(format!(
                        "{} {aggregate_id} snapshot is unreadable: {e}",
                        A::AGGREGATE_TYPE
                    ))
                })
        })
        .transpose()
    }

    async fn save(&self, aggregate: &mut A) -> Result<(), DomainError> {
        let records = aggregate
            .pending_events()
            .iter()
            .map(NewOutboxRecord::from_event)
            .collect::<Result<Vec<_>, _>>()?;
        let state = serde_json::to_value(aggregate.to_state()).map_err(|e| {
            DomainError::Infrastructure(format!("snapshot serialization failed: {e}"))
        })?;
        let expected = aggregate.persisted_version();

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let written = Self::write_snapshot(&mut tx, aggregate, &state, expected)
            .await
            .map_err(db_error)?;
        if written == 0 {
            let actual = Self::current_version(&mut tx, aggregate.aggregate_id())
                .await
                .map_err(db_error)?;
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate.aggregate_id().to_owned(),
                expected,
                actual,
            });
        }

        append_outbox(&mut tx, &records).await.map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        debug!(
            aggregate_type = A::AGGREGATE_TYPE,
            aggregate_id = %aggregate.aggregate_id(),
            version = aggregate.version(),
            outbox_rows = records.len(),
            "aggregate saved"
        );
        aggregate.take_events();
        Ok(())
    }
}
