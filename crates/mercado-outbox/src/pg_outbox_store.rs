//! `PostgreSQL` implementation of the `OutboxStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercado_core::error::DomainError;
use mercado_core::outbox::{ClaimRequest, DeliveryOutcome, OutboxRecord, OutboxStatus, OutboxStore};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::pg_aggregate_repository::db_error;

const RECORD_COLUMNS: &str = "id, event_id, event_type, payload, aggregate_id, partition_key, \
     status, attempts, occurred_at, created_at, sent_at, next_attempt_at, last_error";

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: i64,
    event_id: Uuid,
    event_type: String,
    payload: serde_json::Value,
    aggregate_id: String,
    partition_key: Option<String>,
    status: String,
    attempts: i32,
    occurred_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
    next_attempt_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl TryFrom<OutboxRow> for OutboxRecord {
    type Error = DomainError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            event_id: row.event_id,
            event_type: row.event_type,
            payload: row.payload,
            aggregate_id: row.aggregate_id,
            partition_key: row.partition_key,
            status: OutboxStatus::parse(&row.status)?,
            attempts: row.attempts,
            occurred_at: row.occurred_at,
            created_at: row.created_at,
            sent_at: row.sent_at,
            next_attempt_at: row.next_attempt_at,
            last_error: row.last_error,
        })
    }
}

/// PostgreSQL-backed outbox store.
///
/// Claims use `FOR UPDATE SKIP LOCKED` together with a time-bounded lease
/// (`lease_owner`, `leased_until`), so concurrent publishers never pick the
/// same row and a crashed publisher's rows come back once the lease expires.
#[derive(Debug, Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    /// Creates a new `PgOutboxStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn claim_batch(&self, request: &ClaimRequest) -> Result<Vec<OutboxRecord>, DomainError> {
        let sql = format!(
            r"
            UPDATE outbox
            SET lease_owner = $1, leased_until = $2
            WHERE id IN (
                SELECT id FROM outbox
                WHERE (status = 'PENDING'
                       OR (status = 'FAILED'
                           AND (next_attempt_at IS NULL OR next_attempt_at <= $3)))
                  AND (leased_until IS NULL OR leased_until <= $3)
                ORDER BY occurred_at ASC, id ASC
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {RECORD_COLUMNS}
            "
        );
        let rows: Vec<OutboxRow> = sqlx::query_as(&sql)
            .bind(&request.owner)
            .bind(request.lease_until)
            .bind(request.now)
            .bind(request.limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        // RETURNING does not preserve the subquery order.
        let mut records = rows
            .into_iter()
            .map(OutboxRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn complete_batch(
        &self,
        owner: &str,
        outcomes: &[DeliveryOutcome],
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for outcome in outcomes {
            let query = match outcome {
                DeliveryOutcome::Sent { record_id, sent_at } => sqlx::query(
                    r"
                    UPDATE outbox
                    SET status = 'SENT', sent_at = $3, last_error = NULL,
                        next_attempt_at = NULL, lease_owner = NULL, leased_until = NULL
                    WHERE id = $1 AND lease_owner = $2
                    ",
                )
                .bind(*record_id)
                .bind(owner)
                .bind(*sent_at),
                DeliveryOutcome::Failed {
                    record_id,
                    error,
                    next_attempt_at,
                } => sqlx::query(
                    r"
                    UPDATE outbox
                    SET status = 'FAILED', attempts = attempts + 1, last_error = $3,
                        next_attempt_at = $4, lease_owner = NULL, leased_until = NULL
                    WHERE id = $1 AND lease_owner = $2
                    ",
                )
                .bind(*record_id)
                .bind(owner)
                .bind(error)
                .bind(*next_attempt_at),
                DeliveryOutcome::DeadLettered { record_id, error } => sqlx::query(
                    r"
                    UPDATE outbox
                    SET status = 'DEAD_LETTERED', attempts = attempts + 1, last_error = $3,
                        next_attempt_at = NULL, lease_owner = NULL, leased_until = NULL
                    WHERE id = $1 AND lease_owner = $2
                    ",
                )
                .bind(*record_id)
                .bind(owner)
                .bind(error),
            };
            let affected = query
                .execute(&mut *tx)
                .await
                .map_err(db_error)?
                .rows_affected();
            if affected == 0 {
                warn!(
                    record_id = outcome.record_id(),
                    owner, "lease lost before completion, outcome discarded"
                );
            }
        }
        tx.commit().await.map_err(db_error)
    }

    async fn find_by_event_id(&self, event_id: Uuid) -> Result<Option<OutboxRecord>, DomainError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM outbox WHERE event_id = $1");
        let row: Option<OutboxRow> = sqlx::query_as(&sql)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(OutboxRecord::try_from).transpose()
    }

    async fn requeue(&self, event_id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE outbox
            SET status = 'PENDING', attempts = 0, next_attempt_at = NULL,
                lease_owner = NULL, leased_until = NULL
            WHERE event_id = $1 AND status = 'DEAD_LETTERED'
            ",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn replay(&self, event_id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE outbox
            SET status = 'PENDING', attempts = 0, sent_at = NULL, next_attempt_at = NULL,
                lease_owner = NULL, leased_until = NULL
            WHERE event_id = $1 AND status = 'SENT'
            ",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() == 1)
    }
}
