//! Background workers: the outbox publisher and the event consumers.
//!
//! All workers share one broker and one shutdown signal. Consumers subscribe
//! before the publisher starts, so nothing published at startup is missed.

use std::sync::Arc;

use mercado_accounts::application::membership_reactor::{
    MEMBERSHIP_REACTOR_PATTERN, MembershipReactor,
};
use mercado_accounts::domain::aggregates::User;
use mercado_core::clock::{Clock, SystemClock};
use mercado_core::event_factory::{EventFactory, SystemEventFactory};
use mercado_core::outbox::OutboxStore;
use mercado_core::projection::ProjectionStore;
use mercado_core::repository::AggregateRepository;
use mercado_core::retry::RetryPolicy;
use mercado_core::transport::{DeliveryHandler, MessageSubscriber, TransportError};
use mercado_messaging::{InMemoryBroker, consume};
use mercado_outbox::pg_aggregate_repository::PgAggregateRepository;
use mercado_outbox::pg_outbox_store::PgOutboxStore;
use mercado_outbox::publisher::{OutboxPublisher, PublisherConfig};
use mercado_projection::handler::{
    AFFILIATION_PROJECTION_PATTERN, PRODUCER_APPLICATION_PROJECTION_PATTERN, ProjectionHandler,
};
use mercado_projection::pg_projection_store::PgProjectionStore;
use mercado_projection::producer_view::ProducerApplicationView;
use mercado_projection::projector::{AffiliationProjector, ProducerApplicationProjector};
use mercado_projection::view::AffiliationView;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Stores and sources the workers run against.
#[derive(Clone)]
pub struct WorkerDeps {
    /// Outbox the publisher drains.
    pub outbox: Arc<dyn OutboxStore>,
    /// Affiliation read model.
    pub affiliation_views: Arc<dyn ProjectionStore<AffiliationView>>,
    /// Producer application read model.
    pub producer_application_views: Arc<dyn ProjectionStore<ProducerApplicationView>>,
    /// User store the membership reactor writes through.
    pub users: Arc<dyn AggregateRepository<User>>,
    /// Event source for reactor-issued commands.
    pub event_factory: Arc<dyn EventFactory>,
    /// Wall clock for the publisher and projector.
    pub clock: Arc<dyn Clock>,
}

impl WorkerDeps {
    /// Wires every worker to `PostgreSQL` through `pool`.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        let views = Arc::new(PgProjectionStore::new(pool.clone()));
        Self {
            outbox: Arc::new(PgOutboxStore::new(pool.clone())),
            affiliation_views: views.clone(),
            producer_application_views: views,
            users: Arc::new(PgAggregateRepository::<User>::new(pool.clone())),
            event_factory: Arc::new(SystemEventFactory),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Worker tuning.
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    /// Outbox publisher settings.
    pub publisher: PublisherConfig,
    /// In-place retries for failing consumer deliveries.
    pub consumer_retry: RetryPolicy,
}

/// Handles to the running workers.
pub struct Workers {
    handles: Vec<JoinHandle<()>>,
}

impl Workers {
    /// Subscribes the consumers, then starts them and the publisher.
    ///
    /// # Errors
    ///
    /// Returns the transport error if a subscription cannot be established;
    /// nothing has been spawned in that case.
    pub async fn start(
        deps: WorkerDeps,
        broker: Arc<InMemoryBroker>,
        config: WorkerConfig,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<Self, TransportError> {
        let affiliations: Arc<dyn DeliveryHandler> = Arc::new(ProjectionHandler::new(
            AffiliationProjector::new(deps.affiliation_views, deps.clock.clone()),
        ));
        let producer_applications: Arc<dyn DeliveryHandler> = Arc::new(ProjectionHandler::new(
            ProducerApplicationProjector::new(deps.producer_application_views, deps.clock.clone()),
        ));
        let reactor: Arc<dyn DeliveryHandler> =
            Arc::new(MembershipReactor::new(deps.users, deps.event_factory));

        let consumers = [
            (AFFILIATION_PROJECTION_PATTERN, affiliations),
            (PRODUCER_APPLICATION_PROJECTION_PATTERN, producer_applications),
            (MEMBERSHIP_REACTOR_PATTERN, reactor),
        ];
        let mut subscriptions = Vec::with_capacity(consumers.len());
        for (pattern, handler) in consumers {
            let deliveries = broker.subscribe(pattern).await?;
            subscriptions.push((deliveries, handler));
        }

        let mut handles = Vec::with_capacity(subscriptions.len() + 1);
        for (deliveries, handler) in subscriptions {
            handles.push(tokio::spawn(consume(
                deliveries,
                handler,
                config.consumer_retry.clone(),
                shutdown.clone(),
            )));
        }

        let publisher = OutboxPublisher::new(deps.outbox, broker, deps.clock, config.publisher);
        let publisher_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            publisher.run(publisher_shutdown).await;
        }));

        info!(workers = handles.len(), "background workers started");
        Ok(Self { handles })
    }

    /// Waits for every worker to stop.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task panicked or was cancelled");
            }
        }
        info!("background workers stopped");
    }
}
