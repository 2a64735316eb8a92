//! Command handlers for the Zone Affiliation context.
//!
//! Each handler loads (or creates) the aggregate, runs the domain operation
//! and saves it. Saving writes the state and the outbox rows together, so a
//! handler that returns `Ok` has durably recorded its events.

use mercado_core::aggregate::AggregateRoot;
use mercado_core::command::Command;
use mercado_core::error::DomainError;
use mercado_core::event::DomainEvent;
use mercado_core::event_factory::EventFactory;
use mercado_core::repository::AggregateRepository;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{ZoneAffiliation, new_affiliation_id, new_zone_id};
use crate::domain::commands::{ApproveAffiliation, RejectAffiliation, SubmitAffiliation};

/// Result of a successfully handled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffiliationCommandResult {
    /// The affiliation affected or created by the command.
    pub affiliation_id: String,
    /// The affiliated zone.
    pub zone_id: String,
    /// Aggregate version after the command.
    pub version: i64,
    /// IDs of the events written to the outbox.
    pub event_ids: Vec<Uuid>,
}

async fn persist(
    affiliation: &mut ZoneAffiliation,
    repo: &dyn AggregateRepository<ZoneAffiliation>,
) -> Result<AffiliationCommandResult, DomainError> {
    let event_ids: Vec<Uuid> = affiliation
        .pending_events()
        .iter()
        .map(DomainEvent::event_id)
        .collect();
    repo.save(affiliation).await?;
    Ok(AffiliationCommandResult {
        affiliation_id: affiliation.aggregate_id().to_owned(),
        zone_id: affiliation.zone_id().to_owned(),
        version: affiliation.version(),
        event_ids,
    })
}

async fn load_existing(
    affiliation_id: &str,
    repo: &dyn AggregateRepository<ZoneAffiliation>,
) -> Result<ZoneAffiliation, DomainError> {
    repo.load(affiliation_id)
        .await?
        .ok_or_else(|| DomainError::AggregateNotFound(affiliation_id.to_owned()))
}

/// Handles `SubmitAffiliation`: creates the aggregate with fresh affiliation
/// and zone IDs and persists it.
///
/// # Errors
///
/// Returns `DomainError::Validation` for bad input, or the repository error
/// if the save fails.
#[instrument(
    skip_all,
    fields(
        context = command.context(),
        command = command.command_type(),
        correlation_id = %command.correlation_id()
    )
)]
pub async fn handle_submit_affiliation(
    command: &SubmitAffiliation,
    factory: &dyn EventFactory,
    repo: &dyn AggregateRepository<ZoneAffiliation>,
) -> Result<AffiliationCommandResult, DomainError> {
    let mut affiliation = ZoneAffiliation::submit(
        new_affiliation_id(),
        new_zone_id(),
        &command.requester_id,
        command.details.clone(),
        command.correlation_id,
        factory,
    )?;
    let result = persist(&mut affiliation, repo).await?;
    info!(
        affiliation_id = %result.affiliation_id,
        zone_id = %result.zone_id,
        requester_id = %command.requester_id,
        "affiliation submitted"
    );
    Ok(result)
}

/// Handles `ApproveAffiliation`.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown ID,
/// `DomainError::InvalidTransition` if the request was already decided, or
/// the repository error if the load or save fails.
#[instrument(
    skip_all,
    fields(
        context = command.context(),
        command = command.command_type(),
        correlation_id = %command.correlation_id()
    )
)]
pub async fn handle_approve_affiliation(
    command: &ApproveAffiliation,
    factory: &dyn EventFactory,
    repo: &dyn AggregateRepository<ZoneAffiliation>,
) -> Result<AffiliationCommandResult, DomainError> {
    let mut affiliation = load_existing(&command.affiliation_id, repo).await?;
    affiliation.approve(
        &command.admin_id,
        command.notes.clone(),
        command.correlation_id,
        factory,
    )?;
    let result = persist(&mut affiliation, repo).await?;
    info!(affiliation_id = %result.affiliation_id, admin_id = %command.admin_id, "affiliation approved");
    Ok(result)
}

/// Handles `RejectAffiliation`.
///
/// # Errors
///
/// Same as [`handle_approve_affiliation`].
#[instrument(
    skip_all,
    fields(
        context = command.context(),
        command = command.command_type(),
        correlation_id = %command.correlation_id()
    )
)]
pub async fn handle_reject_affiliation(
    command: &RejectAffiliation,
    factory: &dyn EventFactory,
    repo: &dyn AggregateRepository<ZoneAffiliation>,
) -> Result<AffiliationCommandResult, DomainError> {
    let mut affiliation = load_existing(&command.affiliation_id, repo).await?;
    affiliation.reject(
        &command.admin_id,
        command.notes.clone(),
        command.correlation_id,
        factory,
    )?;
    let result = persist(&mut affiliation, repo).await?;
    info!(affiliation_id = %result.affiliation_id, admin_id = %command.admin_id, "affiliation rejected");
    Ok(result)
}
