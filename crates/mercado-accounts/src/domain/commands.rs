//! Commands for the User Accounts context.

use mercado_core::command::Command;
use uuid::Uuid;

use super::aggregates::ZoneRole;

/// Command to register a new user.
#[derive(Debug, Clone)]
pub struct RegisterUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Login email.
    pub email: String,
    /// Display name.
    pub name: String,
}

impl Command for RegisterUser {
    fn command_type(&self) -> &'static str {
        "accounts.register_user"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to grant a global role.
#[derive(Debug, Clone)]
pub struct GrantGlobalRole {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user receiving the role.
    pub user_id: String,
    /// The role, e.g. `GLOBAL_ADMIN`.
    pub role: String,
    /// The administrator granting it.
    pub actor_id: String,
}

impl Command for GrantGlobalRole {
    fn command_type(&self) -> &'static str {
        "accounts.grant_global_role"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to grant a zone membership.
#[derive(Debug, Clone)]
pub struct GrantZoneMembership {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The event that triggered the grant, if any.
    pub causation_id: Option<Uuid>,
    /// The user joining the zone.
    pub user_id: String,
    /// The zone.
    pub zone_id: String,
    /// Role in the zone.
    pub role: ZoneRole,
    /// Who caused the grant.
    pub caused_by: String,
}

impl Command for GrantZoneMembership {
    fn command_type(&self) -> &'static str {
        "accounts.grant_zone_membership"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
