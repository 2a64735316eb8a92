//! Domain events for the User Accounts context.

use chrono::{DateTime, Utc};
use mercado_core::event::{DomainEvent, EventEnvelope, EventMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::ZoneRole;

/// Emitted when a user account is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    /// The user identifier.
    pub user_id: String,
    /// Login email.
    pub email: String,
    /// Display name.
    pub name: String,
}

/// Emitted when a user gains a global role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalRoleGranted {
    /// The user identifier.
    pub user_id: String,
    /// The granted role.
    pub role: String,
}

/// Emitted when a user gains an active membership in a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneMembershipGranted {
    /// The user identifier.
    pub user_id: String,
    /// The zone joined.
    pub zone_id: String,
    /// Role held in the zone.
    pub role: ZoneRole,
}

/// Event type identifier for [`UserRegistered`].
pub const USER_REGISTERED_EVENT_TYPE: &str = "user.registered";

/// Event type identifier for [`GlobalRoleGranted`].
pub const GLOBAL_ROLE_GRANTED_EVENT_TYPE: &str = "user.global_role_granted";

/// Event type identifier for [`ZoneMembershipGranted`].
pub const ZONE_MEMBERSHIP_GRANTED_EVENT_TYPE: &str = "user.zone_membership_granted";

/// Event payload variants for the User Accounts context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEventKind {
    /// A user registered.
    UserRegistered(UserRegistered),
    /// A global role was granted.
    GlobalRoleGranted(GlobalRoleGranted),
    /// A zone membership was granted.
    ZoneMembershipGranted(ZoneMembershipGranted),
}

/// Domain event envelope for the User Accounts context.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Domain time of the event.
    pub occurred_at: DateTime<Utc>,
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: AccountEventKind,
}

impl AccountEvent {
    /// Rebuilds an account event from its wire envelope.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload is not an
    /// [`AccountEventKind`].
    pub fn from_envelope(envelope: EventEnvelope) -> Result<Self, serde_json::Error> {
        let kind = serde_json::from_value(envelope.payload)?;
        Ok(Self {
            event_id: envelope.event_id,
            occurred_at: envelope.occurred_at,
            metadata: envelope.meta,
            kind,
        })
    }
}

impl DomainEvent for AccountEvent {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn event_type(&self) -> &'static str {
        match &self.kind {
            AccountEventKind::UserRegistered(_) => USER_REGISTERED_EVENT_TYPE,
            AccountEventKind::GlobalRoleGranted(_) => GLOBAL_ROLE_GRANTED_EVENT_TYPE,
            AccountEventKind::ZoneMembershipGranted(_) => ZONE_MEMBERSHIP_GRANTED_EVENT_TYPE,
        }
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.kind)
    }
}
