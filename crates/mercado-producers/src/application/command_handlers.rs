//! Command handlers for the Producer Application context.

use async_trait::async_trait;
use mercado_core::aggregate::AggregateRoot;
use mercado_core::command::Command;
use mercado_core::error::DomainError;
use mercado_core::event::DomainEvent;
use mercado_core::event_factory::EventFactory;
use mercado_core::repository::AggregateRepository;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{ProducerApplication, new_application_id};
use crate::domain::commands::{
    ApproveProducerApplication, RejectProducerApplication, SubmitProducerApplication,
};

/// Lookup of open applications, used to refuse a second one from the same
/// producer to the same zone.
///
/// Backed by the read model, so an application submitted moments earlier
/// may not be visible yet.
#[async_trait]
pub trait PendingApplications: Send + Sync {
    /// The ID of a pending application by `producer_id` to `zone_id`, if any.
    async fn pending_application(
        &self,
        producer_id: &str,
        zone_id: &str,
    ) -> Result<Option<String>, DomainError>;
}

/// Result of a successfully handled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerApplicationCommandResult {
    /// The application affected or created.
    pub application_id: String,
    /// The zone applied to.
    pub zone_id: String,
    /// Aggregate version after the command.
    pub version: i64,
    /// IDs of the events written to the outbox.
    pub event_ids: Vec<Uuid>,
}

async fn persist(
    application: &mut ProducerApplication,
    repo: &dyn AggregateRepository<ProducerApplication>,
) -> Result<ProducerApplicationCommandResult, DomainError> {
    let event_ids = application
        .pending_events()
        .iter()
        .map(DomainEvent::event_id)
        .collect();
    repo.save(application).await?;
    Ok(ProducerApplicationCommandResult {
        application_id: application.aggregate_id().to_owned(),
        zone_id: application.zone_id().to_owned(),
        version: application.version(),
        event_ids,
    })
}

async fn load_existing(
    application_id: &str,
    repo: &dyn AggregateRepository<ProducerApplication>,
) -> Result<ProducerApplication, DomainError> {
    repo.load(application_id)
        .await?
        .ok_or_else(|| DomainError::AggregateNotFound(application_id.to_owned()))
}

/// Handles `SubmitProducerApplication`.
///
/// # Errors
///
/// Returns `DomainError::Conflict` if the producer already has a pending
/// application to the zone, `DomainError::Validation` for bad input, or the
/// repository error if the save fails.
#[instrument(
    skip_all,
    fields(
        context = command.context(),
        command = command.command_type(),
        correlation_id = %command.correlation_id()
    )
)]
pub async fn handle_submit_producer_application(
    command: &SubmitProducerApplication,
    factory: &dyn EventFactory,
    repo: &dyn AggregateRepository<ProducerApplication>,
    pending: &dyn PendingApplications,
) -> Result<ProducerApplicationCommandResult, DomainError> {
    let mut application = ProducerApplication::submit(
        new_application_id(),
        &command.zone_id,
        &command.producer_id,
        command.profile.clone(),
        command.correlation_id,
        factory,
    )?;
    if let Some(existing) = pending
        .pending_application(&command.producer_id, &command.zone_id)
        .await?
    {
        return Err(DomainError::Conflict(format!(
            "producer {} already has pending application {existing} for zone {}",
            command.producer_id, command.zone_id
        )));
    }
    let result = persist(&mut application, repo).await?;
    info!(
        application_id = %result.application_id,
        zone_id = %result.zone_id,
        producer_id = %command.producer_id,
        "producer application submitted"
    );
    Ok(result)
}

/// Handles `ApproveProducerApplication`.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown ID,
/// `DomainError::InvalidTransition` if already decided, or the repository
/// error if the load or save fails.
#[instrument(
    skip_all,
    fields(
        context = command.context(),
        command = command.command_type(),
        correlation_id = %command.correlation_id()
    )
)]
pub async fn handle_approve_producer_application(
    command: &ApproveProducerApplication,
    factory: &dyn EventFactory,
    repo: &dyn AggregateRepository<ProducerApplication>,
) -> Result<ProducerApplicationCommandResult, DomainError> {
    let mut application = load_existing(&command.application_id, repo).await?;
    application.approve(
        &command.admin_id,
        command.notes.clone(),
        command.correlation_id,
        factory,
    )?;
    let result = persist(&mut application, repo).await?;
    info!(application_id = %result.application_id, admin_id = %command.admin_id, "producer application approved");
    Ok(result)
}

/// Handles `RejectProducerApplication`.
///
/// # Errors
///
/// Same as [`handle_approve_producer_application`].
#[instrument(
    skip_all,
    fields(
        context = command.context(),
        command = command.command_type(),
        correlation_id = %command.correlation_id()
    )
)]
pub async fn handle_reject_producer_application(
    command: &RejectProducerApplication,
    factory: &dyn EventFactory,
    repo: &dyn AggregateRepository<ProducerApplication>,
) -> Result<ProducerApplicationCommandResult, DomainError> {
    let mut application = load_existing(&command.application_id, repo).await?;
    application.reject(
        &command.admin_id,
        command.notes.clone(),
        command.correlation_id,
        factory,
    )?;
    let result = persist(&mut application, repo).await?;
    info!(application_id = %result.application_id, admin_id = %command.admin_id, "producer application rejected");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use mercado_core::error::DomainError;
    use mercado_core::outbox::OutboxStatus;
    use mercado_test_support::{FixedEventFactory, InMemoryCommandStore};
    use uuid::Uuid;

    use super::*;
    use crate::domain::aggregates::ApplicationStatus;
    use crate::domain::profile::fixtures::producer_profile;

    /// Open applications keyed by `(producer, zone)`.
    #[derive(Default)]
    struct OpenApplications(Mutex<Vec<(String, String, String)>>);

    impl OpenApplications {
        fn open(&self, producer_id: &str, zone_id: &str, application_id: &str) {
            self.0.lock().unwrap().push((
                producer_id.to_owned(),
                zone_id.to_owned(),
                application_id.to_owned(),
            ));
        }
    }

    #[async_trait]
    impl PendingApplications for OpenApplications {
        async fn pending_application(
            &self,
            producer_id: &str,
            zone_id: &str,
        ) -> Result<Option<String>, DomainError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .iter()
                .find(|(p, z, _)| p == producer_id && z == zone_id)
                .map(|(_, _, id)| id.clone()))
        }
    }

    fn submit_command(zone_id: &str) -> SubmitProducerApplication {
        SubmitProducerApplication {
            correlation_id: Uuid::new_v4(),
            producer_id: "USR-7".to_owned(),
            zone_id: zone_id.to_owned(),
            profile: producer_profile(),
        }
    }

    #[tokio::test]
    async fn test_submit_writes_one_pending_outbox_row_keyed_by_zone() {
        // Arrange
        let factory = FixedEventFactory::new(Utc::now());
        let store = InMemoryCommandStore::new();

        // Act
        let result = handle_submit_producer_application(
            &submit_command("ZON-1"),
            &factory,
            &store,
            &OpenApplications::default(),
        )
        .await
        .unwrap();

        // Assert
        assert!(result.application_id.starts_with("PAP-"));
        assert_eq!(result.version, 1);
        let rows = store.outbox_records();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "producer_application.submitted");
        assert_eq!(rows[0].status, OutboxStatus::Pending);
        assert_eq!(rows[0].partition_key.as_deref(), Some("ZON-1"));
    }

    #[tokio::test]
    async fn test_second_pending_application_to_the_same_zone_is_a_conflict() {
        // Arrange
        let factory = FixedEventFactory::new(Utc::now());
        let store = InMemoryCommandStore::new();
        let open = OpenApplications::default();
        open.open("USR-7", "ZON-1", "PAP-earlier");

        // Act
        let same_zone =
            handle_submit_producer_application(&submit_command("ZON-1"), &factory, &store, &open)
                .await;
        let other_zone =
            handle_submit_producer_application(&submit_command("ZON-2"), &factory, &store, &open)
                .await;

        // Assert
        match same_zone {
            Err(DomainError::Conflict(msg)) => assert!(msg.contains("PAP-earlier")),
            other => panic!("expected Conflict, got {other:?}"),
        }
        assert!(other_zone.is_ok());
        assert_eq!(store.outbox_records().len(), 1);
    }

    #[tokio::test]
    async fn test_approve_then_reject_is_refused_without_a_new_row() {
        // Arrange
        let factory = FixedEventFactory::new(Utc::now());
        let store = InMemoryCommandStore::new();
        let submitted = handle_submit_producer_application(
            &submit_command("ZON-1"),
            &factory,
            &store,
            &OpenApplications::default(),
        )
        .await
        .unwrap();
        let approve = ApproveProducerApplication {
            correlation_id: Uuid::new_v4(),
            application_id: submitted.application_id.clone(),
            admin_id: "USR-zone-admin".to_owned(),
            notes: None,
        };
        let reject = RejectProducerApplication {
            correlation_id: Uuid::new_v4(),
            application_id: submitted.application_id.clone(),
            admin_id: "USR-zone-admin".to_owned(),
            notes: None,
        };

        // Act
        let approved = handle_approve_producer_application(&approve, &factory, &store)
            .await
            .unwrap();
        let rejected = handle_reject_producer_application(&reject, &factory, &store).await;

        // Assert
        assert_eq!(approved.version, 2);
        assert!(matches!(rejected, Err(DomainError::InvalidTransition { .. })));
        assert_eq!(store.outbox_records().len(), 2);
        let stored: ProducerApplication = AggregateRepository::<ProducerApplication>::load(
            &store,
            &submitted.application_id,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(stored.status(), ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn test_decision_on_unknown_application_is_not_found() {
        let factory = FixedEventFactory::new(Utc::now());
        let store = InMemoryCommandStore::new();
        let command = RejectProducerApplication {
            correlation_id: Uuid::new_v4(),
            application_id: "PAP-missing".to_owned(),
            admin_id: "USR-zone-admin".to_owned(),
            notes: None,
        };

        let result = handle_reject_producer_application(&command, &factory, &store).await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
    }
}
