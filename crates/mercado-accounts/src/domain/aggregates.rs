//! Aggregate roots for the User Accounts context.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use mercado_core::aggregate::AggregateRoot;
use mercado_core::error::DomainError;
use mercado_core::event::EventMetadata;
use mercado_core::event_factory::EventFactory;
use mercado_core::validation::{MAX_ID_LEN, MAX_NAME_LEN, require_email, require_within};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    AccountEvent, AccountEventKind, GlobalRoleGranted, UserRegistered, ZoneMembershipGranted,
};

/// Prefix of user identifiers.
pub const USER_ID_PREFIX: &str = "USR-";

/// Generates a fresh user identifier.
#[must_use]
pub fn new_user_id() -> String {
    format!("{USER_ID_PREFIX}{}", Uuid::new_v4())
}

/// Role a user holds inside one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneRole {
    /// Administers the zone.
    ZoneAdmin,
    /// Sells through the zone.
    Producer,
}

impl fmt::Display for ZoneRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ZoneAdmin => "ZONE_ADMIN",
            Self::Producer => "PRODUCER",
        })
    }
}

/// An active membership of a user in a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneMembership {
    /// The zone.
    pub zone_id: String,
    /// Role held in the zone.
    pub role: ZoneRole,
    /// When the membership was granted.
    pub granted_at: DateTime<Utc>,
}

/// Persisted state of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    /// Aggregate identifier (`USR-…`).
    pub id: String,
    /// Login email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Global roles such as `GLOBAL_ADMIN`.
    pub global_roles: BTreeSet<String>,
    /// Active memberships; at most one per zone and role.
    pub memberships: Vec<ZoneMembership>,
    /// Current version.
    pub version: i64,
    /// Domain time of the last emitted event.
    pub last_event_at: DateTime<Utc>,
}

/// Tracing identifiers carried into emitted events.
#[derive(Debug, Clone, Copy)]
pub struct Trace {
    /// Correlation ID of the originating request.
    pub correlation_id: Uuid,
    /// Event that caused this operation, for reactions.
    pub causation_id: Option<Uuid>,
}

impl Trace {
    /// A trace with no causing event.
    #[must_use]
    pub fn new(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            causation_id: None,
        }
    }
}

/// The aggregate root for a user account.
#[derive(Debug)]
pub struct User {
    state: UserState,
    pending_events: Vec<AccountEvent>,
}

impl User {
    /// Registers a new user at version 1.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the email or name is blank or
    /// too long, or the email lacks an `@`.
    pub fn register(
        id: String,
        email: &str,
        name: &str,
        trace: Trace,
        factory: &dyn EventFactory,
    ) -> Result<Self, DomainError> {
        require_email("email", email)?;
        require_within("name", name, MAX_NAME_LEN)?;

        let now = factory.now();
        let mut user = Self {
            state: UserState {
                id,
                email: email.to_owned(),
                name: name.to_owned(),
                global_roles: BTreeSet::new(),
                memberships: Vec::new(),
                version: 1,
                last_event_at: now,
            },
            pending_events: Vec::new(),
        };
        let kind = AccountEventKind::UserRegistered(UserRegistered {
            user_id: user.state.id.clone(),
            email: user.state.email.clone(),
            name: user.state.name.clone(),
        });
        let caused_by = user.state.id.clone();
        user.record(kind, None, &caused_by, trace, now, factory);
        Ok(user)
    }

    /// Grants a global role. Granting a role already held does nothing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the role or actor is blank or
    /// longer than an identifier may be.
    pub fn grant_global_role(
        &mut self,
        role: &str,
        actor_id: &str,
        trace: Trace,
        factory: &dyn EventFactory,
    ) -> Result<(), DomainError> {
        require_within("role", role, MAX_ID_LEN)?;
        require_within("actor_id", actor_id, MAX_ID_LEN)?;
        if self.state.global_roles.contains(role) {
            return Ok(());
        }
        let now = self.advance(factory);
        self.state.global_roles.insert(role.to_owned());
        let kind = AccountEventKind::GlobalRoleGranted(GlobalRoleGranted {
            user_id: self.state.id.clone(),
            role: role.to_owned(),
        });
        self.record(kind, None, actor_id, trace, now, factory);
        Ok(())
    }

    /// Grants an active membership in a zone. Holding the same role there
    /// already makes this a no-op; other roles in the zone are kept.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the zone or actor is blank or
    /// longer than an identifier may be.
    pub fn grant_zone_membership(
        &mut self,
        zone_id: &str,
        role: ZoneRole,
        caused_by: &str,
        trace: Trace,
        factory: &dyn EventFactory,
    ) -> Result<(), DomainError> {
        require_within("zone_id", zone_id, MAX_ID_LEN)?;
        require_within("caused_by", caused_by, MAX_ID_LEN)?;
        if self.has_zone_role(zone_id, role) {
            return Ok(());
        }
        let now = self.advance(factory);
        self.state.memberships.push(ZoneMembership {
            zone_id: zone_id.to_owned(),
            role,
            granted_at: now,
        });
        let kind = AccountEventKind::ZoneMembershipGranted(ZoneMembershipGranted {
            user_id: self.state.id.clone(),
            zone_id: zone_id.to_owned(),
            role,
        });
        self.record(kind, Some(zone_id), caused_by, trace, now, factory);
        Ok(())
    }

    fn advance(&mut self, factory: &dyn EventFactory) -> DateTime<Utc> {
        let now = factory.now().max(self.state.last_event_at);
        self.state.version += 1;
        self.state.last_event_at = now;
        now
    }

    fn record(
        &mut self,
        kind: AccountEventKind,
        partition_key: Option<&str>,
        caused_by: &str,
        trace: Trace,
        occurred_at: DateTime<Utc>,
        factory: &dyn EventFactory,
    ) {
        let mut metadata = EventMetadata::new(Self::AGGREGATE_TYPE, &self.state.id, self.state.version)
            .with_caused_by(caused_by)
            .with_correlation_id(trace.correlation_id.to_string());
        if let Some(key) = partition_key {
            metadata = metadata.with_partition_key(key);
        }
        if let Some(causation_id) = trace.causation_id {
            metadata = metadata.with_causation_id(causation_id.to_string());
        }
        self.pending_events.push(AccountEvent {
            event_id: factory.next_event_id(),
            occurred_at,
            metadata,
            kind,
        });
    }

    /// Login email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.state.email
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Whether the user holds `role` globally.
    #[must_use]
    pub fn has_global_role(&self, role: &str) -> bool {
        self.state.global_roles.contains(role)
    }

    /// The user's membership in a zone, if any.
    #[must_use]
    pub fn membership(&self, zone_id: &str, role: ZoneRole) -> Option<&ZoneMembership> {
        self.state
            .memberships
            .iter()
            .find(|m| m.zone_id == zone_id && m.role == role)
    }

    /// Whether the user holds `role` in `zone_id`.
    #[must_use]
    pub fn has_zone_role(&self, zone_id: &str, role: ZoneRole) -> bool {
        self.membership(zone_id, role).is_some()
    }

    /// Every role the user holds in `zone_id`.
    pub fn zone_roles<'a>(&'a self, zone_id: &'a str) -> impl Iterator<Item = ZoneRole> + 'a {
        self.state
            .memberships
            .iter()
            .filter(move |m| m.zone_id == zone_id)
            .map(|m| m.role)
    }
}

impl AggregateRoot for User {
    type Event = AccountEvent;
    type State = UserState;

    const AGGREGATE_TYPE: &'static str = "User";

    fn aggregate_id(&self) -> &str {
        &self.state.id
    }

    fn version(&self) -> i64 {
        self.state.version
    }

    fn pending_events(&self) -> &[Self::Event] {
        &self.pending_events
    }

    fn take_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.pending_events)
    }

    fn to_state(&self) -> Self::State {
        self.state.clone()
    }

    fn rehydrate(state: Self::State) -> Self {
        Self {
            state,
            pending_events: Vec::new(),
        }
    }
}
