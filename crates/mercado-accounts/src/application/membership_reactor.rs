//! Reaction to approvals that give a user a role in a zone.
//!
//! An approved zone affiliation makes the requester the zone's admin; an
//! approved producer application makes the producer a member of the zone.
//! Grants go through the normal command path, so the resulting
//! `user.zone_membership_granted` event reaches the outbox like any other.

use std::sync::Arc;

use async_trait::async_trait;
use mercado_affiliation::domain::events::{
    AFFILIATION_APPROVED_EVENT_TYPE, AffiliationEvent, AffiliationEventKind,
};
use mercado_core::error::DomainError;
use mercado_core::event::{EventEnvelope, EventMetadata};
use mercado_core::event_factory::EventFactory;
use mercado_core::repository::AggregateRepository;
use mercado_core::transport::{Delivery, DeliveryHandler, HandlerError};
use mercado_producers::domain::events::{
    PRODUCER_APPLICATION_APPROVED_EVENT_TYPE, ProducerApplicationEvent,
    ProducerApplicationEventKind,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::command_handlers::handle_grant_zone_membership;
use crate::domain::aggregates::{User, ZoneRole};
use crate::domain::commands::GrantZoneMembership;

/// Topic pattern the reactor subscribes to.
pub const MEMBERSHIP_REACTOR_PATTERN: &str = "*.approved.*";

/// Grants zone roles on approval: `ZONE_ADMIN` to an affiliation's
/// requester, `PRODUCER` to an accepted producer.
pub struct MembershipReactor {
    users: Arc<dyn AggregateRepository<User>>,
    factory: Arc<dyn EventFactory>,
}

impl MembershipReactor {
    /// Creates a reactor writing through `users`.
    #[must_use]
    pub fn new(users: Arc<dyn AggregateRepository<User>>, factory: Arc<dyn EventFactory>) -> Self {
        Self { users, factory }
    }

    fn affiliation_grant(envelope: EventEnvelope) -> Result<Option<GrantZoneMembership>, HandlerError> {
        let event = AffiliationEvent::from_envelope(envelope)
            .map_err(|e| HandlerError::Permanent(format!("undecodable affiliation event: {e}")))?;
        let AffiliationEventKind::AffiliationApproved(approved) = event.kind else {
            return Ok(None);
        };
        Ok(Some(GrantZoneMembership {
            correlation_id: correlation_of(&event.metadata, event.event_id),
            causation_id: Some(event.event_id),
            user_id: approved.requester_id,
            zone_id: approved.zone_id,
            role: ZoneRole::ZoneAdmin,
            caused_by: approved.decided_by,
        }))
    }

    fn producer_grant(envelope: EventEnvelope) -> Result<Option<GrantZoneMembership>, HandlerError> {
        let event = ProducerApplicationEvent::from_envelope(envelope).map_err(|e| {
            HandlerError::Permanent(format!("undecodable producer application event: {e}"))
        })?;
        let ProducerApplicationEventKind::Approved(approved) = event.kind else {
            return Ok(None);
        };
        Ok(Some(GrantZoneMembership {
            correlation_id: correlation_of(&event.metadata, event.event_id),
            causation_id: Some(event.event_id),
            user_id: approved.producer_id,
            zone_id: approved.zone_id,
            role: ZoneRole::Producer,
            caused_by: approved.decided_by,
        }))
    }
}

fn correlation_of(metadata: &EventMetadata, event_id: Uuid) -> Uuid {
    metadata
        .correlation_id()
        .and_then(|c| Uuid::parse_str(c).ok())
        .unwrap_or(event_id)
}

#[async_trait]
impl DeliveryHandler for MembershipReactor {
    fn name(&self) -> &'static str {
        "membership-reactor"
    }

    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        let envelope = EventEnvelope::from_slice(&delivery.payload)
            .map_err(|e| HandlerError::Permanent(format!("undecodable envelope: {e}")))?;
        let event_id = envelope.event_id;
        let grant = match envelope.event_type.as_str() {
            AFFILIATION_APPROVED_EVENT_TYPE => Self::affiliation_grant(envelope)?,
            PRODUCER_APPLICATION_APPROVED_EVENT_TYPE => Self::producer_grant(envelope)?,
            _ => None,
        };
        let Some(command) = grant else {
            debug!(routing_key = %delivery.routing_key, "ignoring event that grants no role");
            return Ok(());
        };

        match handle_grant_zone_membership(&command, self.factory.as_ref(), self.users.as_ref())
            .await
        {
            Ok(_) => Ok(()),
            // An approval for a user this service never saw cannot succeed later.
            Err(DomainError::AggregateNotFound(user_id)) => {
                warn!(
                    user_id,
                    zone_id = %command.zone_id,
                    role = %command.role,
                    event_id = %event_id,
                    "user not found, membership not granted"
                );
                Ok(())
            }
            Err(e) if e.is_user_facing() => Err(HandlerError::Permanent(e.to_string())),
            Err(e) => Err(HandlerError::Transient(e.to_string())),
        }
    }
}
