//! Commands for the Zone Affiliation context.

use mercado_core::command::Command;
use uuid::Uuid;

use super::details::ZoneDetails;

/// Command to file a new zone affiliation request.
#[derive(Debug, Clone)]
pub struct SubmitAffiliation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user filing the request.
    pub requester_id: String,
    /// Zone data.
    pub details: ZoneDetails,
}

impl Command for SubmitAffiliation {
    fn command_type(&self) -> &'static str {
        "affiliation.submit"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to approve a pending affiliation.
#[derive(Debug, Clone)]
pub struct ApproveAffiliation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The affiliation to approve.
    pub affiliation_id: String,
    /// The deciding administrator.
    pub admin_id: String,
    /// Optional decision notes.
    pub notes: Option<String>,
}

impl Command for ApproveAffiliation {
    fn command_type(&self) -> &'static str {
        "affiliation.approve"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to reject a pending affiliation.
#[derive(Debug, Clone)]
pub struct RejectAffiliation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The affiliation to reject.
    pub affiliation_id: String,
    /// The deciding administrator.
    pub admin_id: String,
    /// Optional decision notes.
    pub notes: Option<String>,
}

impl Command for RejectAffiliation {
    fn command_type(&self) -> &'static str {
        "affiliation.reject"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use mercado_core::command::Command;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_decision_commands_share_the_affiliation_context() {
        let correlation_id = Uuid::new_v4();
        let approve = ApproveAffiliation {
            correlation_id,
            affiliation_id: "AFI-1".to_owned(),
            admin_id: "USR-admin".to_owned(),
            notes: None,
        };
        let reject = RejectAffiliation {
            correlation_id,
            affiliation_id: "AFI-1".to_owned(),
            admin_id: "USR-admin".to_owned(),
            notes: None,
        };

        assert_eq!(approve.command_type(), "affiliation.approve");
        assert_eq!(reject.command_type(), "affiliation.reject");
        assert_eq!(approve.context(), reject.context());
        assert_eq!(Command::correlation_id(&approve), correlation_id);
    }
}
