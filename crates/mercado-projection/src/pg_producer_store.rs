//! `PostgreSQL` storage for producer application views.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mercado_core::error::DomainError;
use mercado_producers::application::command_handlers::PendingApplications;
use mercado_producers::domain::aggregates::ApplicationStatus;
use sqlx::{PgPool, Postgres, Transaction};

use crate::pg_projection_store::{PgProjectionStore, PgView, db_error};
use crate::producer_queries::ProducerApplicationQueries;
use crate::producer_view::ProducerApplicationView;

const VIEW_COLUMNS: &str = "id, zone_id, producer_id, producer_name, document, phone, email, \
     address, product_types, state, submitted_at, decided_at, decided_by, decision_notes, \
     version, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ViewRow {
    id: String,
    zone_id: String,
    producer_id: String,
    producer_name: String,
    document: String,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    product_types: Option<String>,
    state: String,
    submitted_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
    decided_by: Option<String>,
    decision_notes: Option<String>,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ViewRow> for ProducerApplicationView {
    type Error = DomainError;

    fn try_from(row: ViewRow) -> Result<Self, Self::Error> {
        let state = ApplicationStatus::parse(&row.state).map_err(|e| {
            DomainError::Infrastructure(format!("producer application view {} is corrupt: {e}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            zone_id: row.zone_id,
            producer_id: row.producer_id,
            producer_name: row.producer_name,
            document: row.document,
            phone: row.phone,
            email: row.email,
            address: row.address,
            product_types: row.product_types,
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

async fn applications_where(
    pool: &PgPool,
    condition: &str,
    value: &str,
) -> Result<Vec<ProducerApplicationView>, DomainError> {
    let sql = format!(
        "SELECT {VIEW_COLUMNS} FROM producer_application_views WHERE {condition} = $1 \
         ORDER BY submitted_at, id"
    );
    let rows: Vec<ViewRow> = sqlx::query_as(&sql)
        .bind(value)
        .fetch_all(pool)
        .await
        .map_err(db_error)?;
    rows.into_iter().map(ProducerApplicationView::try_from).collect()
}

#[async_trait]
impl PgView for ProducerApplicationView {
    async fn fetch(pool: &PgPool, id: &str) -> Result<Option<Self>, DomainError> {
        let sql = format!("SELECT {VIEW_COLUMNS} FROM producer_application_views WHERE id = $1");
        let row: Option<ViewRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(db_error)?;
        row.map(ProducerApplicationView::try_from).transpose()
    }

    async fn upsert(&self, tx: &mut Transaction<'_, Postgres>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            INSERT INTO producer_application_views (
                id, zone_id, producer_id, producer_name, document, phone, email, address,
                product_types, state, submitted_at, decided_at, decided_by, decision_notes,
                version, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO UPDATE SET
                zone_id = EXCLUDED.zone_id,
                producer_id = EXCLUDED.producer_id,
                producer_name = EXCLUDED.producer_name,
                document = EXCLUDED.document,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                address = EXCLUDED.address,
                product_types = EXCLUDED.product_types,
                state = EXCLUDED.state,
                submitted_at = EXCLUDED.submitted_at,
                decided_at = COALESCE(producer_application_views.decided_at, EXCLUDED.decided_at),
                decided_by = EXCLUDED.decided_by,
                decision_notes = EXCLUDED.decision_notes,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            WHERE producer_application_views.version <= EXCLUDED.version
            ",
        )
        .bind(&self.id)
        .bind(&self.zone_id)
        .bind(&self.producer_id)
        .bind(&self.producer_name)
        .bind(&self.document)
        .bind(&self.phone)
        .bind(&self.email)
        .bind(&self.address)
        .bind(&self.product_types)
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
impl ProducerApplicationQueries for PgProjectionStore {
    async fn get_application(
        &self,
        application_id: &str,
    ) -> Result<Option<ProducerApplicationView>, DomainError> {
        ProducerApplicationView::fetch(self.pool(), application_id).await
    }

    async fn applications_by_zone(
        &self,
        zone_id: &str,
    ) -> Result<Vec<ProducerApplicationView>, DomainError> {
        applications_where(self.pool(), "zone_id", zone_id).await
    }

    async fn applications_by_state(
        &self,
        state: ApplicationStatus,
    ) -> Result<Vec<ProducerApplicationView>, DomainError> {
        applications_where(self.pool(), "state", state.as_str()).await
    }

    async fn applications_by_producer(
        &self,
        producer_id: &str,
    ) -> Result<Vec<ProducerApplicationView>, DomainError> {
        applications_where(self.pool(), "producer_id", producer_id).await
    }
}

#[async_trait]
impl PendingApplications for PgProjectionStore {
    async fn pending_application(
        &self,
        producer_id: &str,
        zone_id: &str,
    ) -> Result<Option<String>, DomainError> {
        let row: Option<(String,)> = sqlx::query_as(
            r"
            SELECT id FROM producer_application_views
            WHERE producer_id = $1 AND zone_id = $2 AND state = $3
            ORDER BY submitted_at
            LIMIT 1
            ",
        )
        .bind(producer_id)
        .bind(zone_id)
        .bind(ApplicationStatus::Pending.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(db_error)?;
        Ok(row.map(|(id,)| id))
    }
}
