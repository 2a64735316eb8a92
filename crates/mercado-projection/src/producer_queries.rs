//! Query handlers over the producer application read model.

use async_trait::async_trait;
use mercado_core::error::DomainError;
use mercado_producers::domain::aggregates::ApplicationStatus;

use crate::producer_view::ProducerApplicationView;

/// Indexed lookups on `producer_application_views`.
#[async_trait]
pub trait ProducerApplicationQueries: Send + Sync {
    /// Point lookup by application ID.
    async fn get_application(
        &self,
        application_id: &str,
    ) -> Result<Option<ProducerApplicationView>, DomainError>;

    /// All applications to a zone.
    async fn applications_by_zone(
        &self,
        zone_id: &str,
    ) -> Result<Vec<ProducerApplicationView>, DomainError>;

    /// All applications in a given state.
    async fn applications_by_state(
        &self,
        state: ApplicationStatus,
    ) -> Result<Vec<ProducerApplicationView>, DomainError>;

    /// All applications filed by a producer.
    async fn applications_by_producer(
        &self,
        producer_id: &str,
    ) -> Result<Vec<ProducerApplicationView>, DomainError>;
}

/// Selects which index a listing uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerApplicationFilter {
    /// By zone.
    Zone(String),
    /// By application state.
    State(ApplicationStatus),
    /// By applying producer.
    Producer(String),
}

/// Retrieves one producer application view.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the view does not exist yet.
pub async fn get_producer_application_by_id(
    application_id: &str,
    queries: &dyn ProducerApplicationQueries,
) -> Result<ProducerApplicationView, DomainError> {
    queries
        .get_application(application_id)
        .await?
        .ok_or_else(|| DomainError::AggregateNotFound(application_id.to_owned()))
}

/// Lists applications matching `filter`, oldest submission first.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the read store fails.
pub async fn list_producer_applications(
    filter: &ProducerApplicationFilter,
    queries: &dyn ProducerApplicationQueries,
) -> Result<Vec<ProducerApplicationView>, DomainError> {
    let mut views = match filter {
        ProducerApplicationFilter::Zone(zone_id) => queries.applications_by_zone(zone_id).await?,
        ProducerApplicationFilter::State(state) => queries.applications_by_state(*state).await?,
        ProducerApplicationFilter::Producer(producer_id) => {
            queries.applications_by_producer(producer_id).await?
        }
    };
    views.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
    Ok(views)
}
