//! `PostgreSQL` implementation of the read model stores.
//!
//! One [`PgProjectionStore`] serves every view that implements [`PgView`];
//! the ledger is shared, so an event ID is handled once across projections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercado_affiliation::domain::aggregates::AffiliationStatus;
use mercado_core::error::DomainError;
use mercado_core::projection::{CommitOutcome, ProcessedEvent, ProjectionStore, ReadModel};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::queries::AffiliationQueries;
use crate::view::AffiliationView;

const VIEW_COLUMNS: &str = "id, zone_id, requester_id, hamlet_name, municipality, contact_phone, \
     contact_email, representative_name, representative_document, representative_email, state, \
     submitted_at, decided_at, decided_by, decision_notes, version, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ViewRow {
    id: String,
    zone_id: String,
    requester_id: String,
    hamlet_name: String,
    municipality: String,
    contact_phone: Option<String>,
    contact_email: Option<String>,
    representative_name: String,
    representative_document: String,
    representative_email: String,
    state: String,
    submitted_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
    decided_by: Option<String>,
    decision_notes: Option<String>,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ViewRow> for AffiliationView {
    type Error = DomainError;

    fn try_from(row: ViewRow) -> Result<Self, Self::Error> {
        let state = AffiliationStatus::parse(&row.state).map_err(|e| {
            DomainError::Infrastructure(format!("affiliation view {} is corrupt: {e}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            zone_id: row.zone_id,
            requester_id: row.requester_id,
            hamlet_name: row.hamlet_name,
            municipality: row.municipality,
            contact_phone: row.contact_phone,
            contact_email: row.contact_email,
            representative_name: row.representative_name,
            representative_document: row.representative_document,
            representative_email: row.representative_email,
            state,
            submitted_at: row.submitted_at,
            decided_at: row.decided_at,
            decided_by: row.decided_by,
            decision_notes: row.decision_notes,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn db_error(e: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(e.to_string())
}

/// A view stored in its own table.
#[async_trait]
pub trait PgView: ReadModel + Sized + 'static {
    /// Point lookup by view key.
    async fn fetch(pool: &PgPool, id: &str) -> Result<Option<Self>, DomainError>;

    /// Inserts or overwrites the row unless the stored version is higher.
    /// Returns the number of rows written.
    async fn upsert(&self, tx: &mut Transaction<'_, Postgres>) -> Result<u64, sqlx::Error>;
}

/// PostgreSQL-backed read models and processed-event ledger.
///
/// The ledger insert and the view upsert share one transaction. The upsert
/// only overwrites a row whose stored version is not higher, so concurrent
/// projectors cannot move a view backwards.
#[derive(Debug, Clone)]
pub struct PgProjectionStore {
    pool: PgPool,
}

impl PgProjectionStore {
    /// Creates a new `PgProjectionStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn affiliations_where(
        &self,
        condition: &str,
        value: &str,
    ) -> Result<Vec<AffiliationView>, DomainError> {
        let sql = format!(
            "SELECT {VIEW_COLUMNS} FROM affiliation_views WHERE {condition} = $1 \
             ORDER BY submitted_at, id"
        );
        let rows: Vec<ViewRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.into_iter().map(AffiliationView::try_from).collect()
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PgView for AffiliationView {
    async fn fetch(pool: &PgPool, id: &str) -> Result<Option<Self>, DomainError> {
        let sql = format!("SELECT {VIEW_COLUMNS} FROM affiliation_views WHERE id = $1");
        let row: Option<ViewRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(db_error)?;
        row.map(AffiliationView::try_from).transpose()
    }

    async fn upsert(&self, tx: &mut Transaction<'_, Postgres>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            INSERT INTO affiliation_views (
                id, zone_id, requester_id, hamlet_name, municipality, contact_phone,
                contact_email, representative_name, representative_document,
                representative_email, state, submitted_at, decided_at, decided_by,
                decision_notes, version, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (id) DO UPDATE SET
                zone_id = EXCLUDED.zone_id,
                requester_id = EXCLUDED.requester_id,
                hamlet_name = EXCLUDED.hamlet_name,
                municipality = EXCLUDED.municipality,
                contact_phone = EXCLUDED.contact_phone,
                contact_email = EXCLUDED.contact_email,
                representative_name = EXCLUDED.representative_name,
                representative_document = EXCLUDED.representative_document,
                representative_email = EXCLUDED.representative_email,
                state = EXCLUDED.state,
                submitted_at = EXCLUDED.submitted_at,
                decided_at = COALESCE(affiliation_views.decided_at, EXCLUDED.decided_at),
                decided_by = EXCLUDED.decided_by,
                decision_notes = EXCLUDED.decision_notes,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            WHERE affiliation_views.version <= EXCLUDED.version
            ",
        )
        .bind(&self.id)
        .bind(&self.zone_id)
        .bind(&self.requester_id)
        .bind(&self.hamlet_name)
        .bind(&self.municipality)
        .bind(&self.contact_phone)
        .bind(&self.contact_email)
        .bind(&self.representative_name)
        .bind(&self.representative_document)
        .bind(&self.representative_email)
        .bind(self.state.as_str())
        .bind(self.submitted_at)
        .bind(self.decided_at)
        .bind(&self.decided_by)
        .bind(&self.decision_notes)
        .bind(self.version)
        .bind(self.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl<V: PgView> ProjectionStore<V> for PgProjectionStore {
    async fn is_processed(&self, event_id: Uuid) -> Result<bool, DomainError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM processed_events WHERE event_id = $1)")
                .bind(event_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(exists)
    }

    async fn load(&self, aggregate_id: &str) -> Result<Option<V>, DomainError> {
        V::fetch(&self.pool, aggregate_id).await
    }

    async fn commit(
        &self,
        view: Option<&V>,
        processed: &ProcessedEvent,
    ) -> Result<CommitOutcome, DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let recorded = sqlx::query(
            r"
            INSERT INTO processed_events (event_id, aggregate_id, event_type, processed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING
            ",
        )
        .bind(processed.event_id)
        .bind(&processed.aggregate_id)
        .bind(&processed.event_type)
        .bind(processed.processed_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .rows_affected();

        if recorded == 0 {
            tx.rollback().await.map_err(db_error)?;
            debug!(event_id = %processed.event_id, "ledger conflict, event already processed");
            return Ok(CommitOutcome::AlreadyProcessed);
        }

        if let Some(view) = view {
            let written = view.upsert(&mut tx).await.map_err(db_error)?;
            if written == 0 {
                debug!(
                    view_id = %view.key(),
                    version = view.version(),
                    "newer view already stored, upsert skipped"
                );
            }
        }

        tx.commit().await.map_err(db_error)?;
        Ok(CommitOutcome::Committed)
    }
}

#[async_trait]
impl AffiliationQueries for PgProjectionStore {
    async fn get(&self, affiliation_id: &str) -> Result<Option<AffiliationView>, DomainError> {
        AffiliationView::fetch(&self.pool, affiliation_id).await
    }

    async fn by_zone(&self, zone_id: &str) -> Result<Vec<AffiliationView>, DomainError> {
        self.affiliations_where("zone_id", zone_id).await
    }

    async fn by_state(&self, state: AffiliationStatus) -> Result<Vec<AffiliationView>, DomainError> {
        self.affiliations_where("state", state.as_str()).await
    }

    async fn by_requester(&self, requester_id: &str) -> Result<Vec<AffiliationView>, DomainError> {
        self.affiliations_where("requester_id", requester_id).await
    }
}
