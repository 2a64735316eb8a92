//! Command handlers for the User Accounts context.

use mercado_core::aggregate::AggregateRoot;
use mercado_core::command::Command;
use mercado_core::error::DomainError;
use mercado_core::event::DomainEvent;
use mercado_core::event_factory::EventFactory;
use mercado_core::repository::AggregateRepository;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Trace, User, new_user_id};
use crate::domain::commands::{GrantGlobalRole, GrantZoneMembership, RegisterUser};

/// Result of a successfully handled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCommandResult {
    /// The user affected or created by the command.
    pub user_id: String,
    /// Aggregate version after the command.
    pub version: i64,
    /// IDs of the events written to the outbox; empty for a no-op.
    pub event_ids: Vec<Uuid>,
}

async fn persist(
    user: &mut User,
    repo: &dyn AggregateRepository<User>,
) -> Result<UserCommandResult, DomainError> {
    let event_ids: Vec<Uuid> = user
        .pending_events()
        .iter()
        .map(DomainEvent::event_id)
        .collect();
    if event_ids.is_empty() {
        debug!(user_id = %user.aggregate_id(), "command changed nothing, skipping save");
    } else {
        repo.save(user).await?;
    }
    Ok(UserCommandResult {
        user_id: user.aggregate_id().to_owned(),
        version: user.version(),
        event_ids,
    })
}

async fn load_existing(
    user_id: &str,
    repo: &dyn AggregateRepository<User>,
) -> Result<User, DomainError> {
    repo.load(user_id)
        .await?
        .ok_or_else(|| DomainError::AggregateNotFound(user_id.to_owned()))
}

/// Handles `RegisterUser`.
///
/// # Errors
///
/// Returns `DomainError::Validation` for bad input, or the repository error
/// if the save fails.
#[instrument(
    skip_all,
    fields(command = command.command_type(), correlation_id = %command.correlation_id())
)]
pub async fn handle_register_user(
    command: &RegisterUser,
    factory: &dyn EventFactory,
    repo: &dyn AggregateRepository<User>,
) -> Result<UserCommandResult, DomainError> {
    let mut user = User::register(
        new_user_id(),
        &command.email,
        &command.name,
        Trace::new(command.correlation_id),
        factory,
    )?;
    let result = persist(&mut user, repo).await?;
    info!(user_id = %result.user_id, "user registered");
    Ok(result)
}

/// Handles `GrantGlobalRole`.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown user, or the
/// validation or repository error.
#[instrument(
    skip_all,
    fields(command = command.command_type(), correlation_id = %command.correlation_id())
)]
pub async fn handle_grant_global_role(
    command: &GrantGlobalRole,
    factory: &dyn EventFactory,
    repo: &dyn AggregateRepository<User>,
) -> Result<UserCommandResult, DomainError> {
    let mut user = load_existing(&command.user_id, repo).await?;
    user.grant_global_role(
        &command.role,
        &command.actor_id,
        Trace::new(command.correlation_id),
        factory,
    )?;
    persist(&mut user, repo).await
}

/// Handles `GrantZoneMembership`.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown user, or the
/// validation or repository error.
#[instrument(
    skip_all,
    fields(command = command.command_type(), correlation_id = %command.correlation_id())
)]
pub async fn handle_grant_zone_membership(
    command: &GrantZoneMembership,
    factory: &dyn EventFactory,
    repo: &dyn AggregateRepository<User>,
) -> Result<UserCommandResult, DomainError> {
    let mut user = load_existing(&command.user_id, repo).await?;
    user.grant_zone_membership(
        &command.zone_id,
        command.role,
        &command.caused_by,
        Trace {
            correlation_id: command.correlation_id,
            causation_id: command.causation_id,
        },
        factory,
    )?;
    let result = persist(&mut user, repo).await?;
    info!(
        user_id = %result.user_id,
        zone_id = %command.zone_id,
        role = %command.role,
        granted = !result.event_ids.is_empty(),
        "zone membership handled"
    );
    Ok(result)
}
