//! Query handlers over the affiliation read model.
//!
//! Reads never touch the command side; they only see what the projector has
//! written so far.

use async_trait::async_trait;
use mercado_affiliation::domain::aggregates::AffiliationStatus;
use mercado_core::error::DomainError;

use crate::view::AffiliationView;

/// Indexed lookups on `affiliation_views`.
#[async_trait]
pub trait AffiliationQueries: Send + Sync {
    /// Point lookup by affiliation ID.
    async fn get(&self, affiliation_id: &str) -> Result<Option<AffiliationView>, DomainError>;

    /// All affiliations for a zone.
    async fn by_zone(&self, zone_id: &str) -> Result<Vec<AffiliationView>, DomainError>;

    /// All affiliations in a given state.
    async fn by_state(&self, state: AffiliationStatus) -> Result<Vec<AffiliationView>, DomainError>;

    /// All affiliations filed by a user.
    async fn by_requester(&self, requester_id: &str) -> Result<Vec<AffiliationView>, DomainError>;
}

/// Selects which index a listing uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffiliationFilter {
    /// By zone.
    Zone(String),
    /// By request state.
    State(AffiliationStatus),
    /// By requesting user.
    Requester(String),
}

/// Retrieves one affiliation view.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the view does not exist yet,
/// which includes affiliations the projector has not caught up with.
pub async fn get_affiliation_by_id(
    affiliation_id: &str,
    queries: &dyn AffiliationQueries,
) -> Result<AffiliationView, DomainError> {
    queries
        .get(affiliation_id)
        .await?
        .ok_or_else(|| DomainError::AggregateNotFound(affiliation_id.to_owned()))
}

/// Lists affiliations matching `filter`, oldest submission first.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the read store fails.
pub async fn list_affiliations(
    filter: &AffiliationFilter,
    queries: &dyn AffiliationQueries,
) -> Result<Vec<AffiliationView>, DomainError> {
    let mut views = match filter {
        AffiliationFilter::Zone(zone_id) => queries.by_zone(zone_id).await?,
        AffiliationFilter::State(state) => queries.by_state(*state).await?,
        AffiliationFilter::Requester(requester_id) => queries.by_requester(requester_id).await?,
    };
    views.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then_with(|| a.id.cmp(&b.id)));
    Ok(views)
}
