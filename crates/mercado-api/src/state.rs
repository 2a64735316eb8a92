//! Shared application state.

use std::sync::Arc;

use mercado_accounts::domain::aggregates::User;
use mercado_affiliation::domain::aggregates::ZoneAffiliation;
use mercado_core::event_factory::{EventFactory, SystemEventFactory};
use mercado_core::outbox::OutboxStore;
use mercado_core::repository::AggregateRepository;
use mercado_outbox::pg_aggregate_repository::PgAggregateRepository;
use mercado_outbox::pg_outbox_store::PgOutboxStore;
use mercado_producers::application::command_handlers::PendingApplications;
use mercado_producers::domain::aggregates::ProducerApplication;
use mercado_projection::pg_projection_store::PgProjectionStore;
use mercado_projection::producer_queries::ProducerApplicationQueries;
use mercado_projection::queries::AffiliationQueries;
use sqlx::PgPool;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Zone affiliation command store.
    pub affiliations: Arc<dyn AggregateRepository<ZoneAffiliation>>,
    /// Producer application command store.
    pub producer_applications: Arc<dyn AggregateRepository<ProducerApplication>>,
    /// User command store.
    pub users: Arc<dyn AggregateRepository<User>>,
    /// Outbox, for operator requeues and replays.
    pub outbox: Arc<dyn OutboxStore>,
    /// Affiliation read model.
    pub affiliation_views: Arc<dyn AffiliationQueries>,
    /// Producer application read model.
    pub producer_application_views: Arc<dyn ProducerApplicationQueries>,
    /// Open applications, checked before a new one is accepted.
    pub pending_applications: Arc<dyn PendingApplications>,
    /// Event ID and timestamp source for aggregates.
    pub event_factory: Arc<dyn EventFactory>,
}

impl AppState {
    /// Wires every store to `PostgreSQL` through `pool`.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        let views = Arc::new(PgProjectionStore::new(pool.clone()));
        Self {
            affiliations: Arc::new(PgAggregateRepository::<ZoneAffiliation>::new(pool.clone())),
            producer_applications: Arc::new(PgAggregateRepository::<ProducerApplication>::new(
                pool.clone(),
            )),
            users: Arc::new(PgAggregateRepository::<User>::new(pool.clone())),
            outbox: Arc::new(PgOutboxStore::new(pool.clone())),
            affiliation_views: views.clone(),
            producer_application_views: views.clone(),
            pending_applications: views,
            event_factory: Arc::new(SystemEventFactory),
        }
    }
}
