//! Commands for the Producer Application context.

use mercado_core::command::Command;
use uuid::Uuid;

use super::profile::ProducerProfile;

/// Command for a producer to apply to a zone.
#[derive(Debug, Clone)]
pub struct SubmitProducerApplication {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The applying user.
    pub producer_id: String,
    /// The zone applied to.
    pub zone_id: String,
    /// Declared producer data.
    pub profile: ProducerProfile,
}

impl Command for SubmitProducerApplication {
    fn command_type(&self) -> &'static str {
        "producer_application.submit"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to accept a pending application.
#[derive(Debug, Clone)]
pub struct ApproveProducerApplication {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The application to accept.
    pub application_id: String,
    /// The deciding zone administrator.
    pub admin_id: String,
    /// Optional decision notes.
    pub notes: Option<String>,
}

impl Command for ApproveProducerApplication {
    fn command_type(&self) -> &'static str {
        "producer_application.approve"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to turn down a pending application.
#[derive(Debug, Clone)]
pub struct RejectProducerApplication {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The application to reject.
    pub application_id: String,
    /// The deciding zone administrator.
    pub admin_id: String,
    /// Optional decision notes.
    pub notes: Option<String>,
}

impl Command for RejectProducerApplication {
    fn command_type(&self) -> &'static str {
        "producer_application.reject"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
