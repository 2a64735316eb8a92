//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(String),

    /// A state-machine guard rejected the operation.
    #[error("invalid transition from {from} on aggregate {aggregate_id}: cannot {action}")]
    InvalidTransition {
        /// The aggregate the operation targeted.
        aggregate_id: String,
        /// The state the aggregate was in.
        from: String,
        /// The rejected operation.
        action: &'static str,
    },

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: String,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// The request duplicates one that is still open.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for errors the caller caused and can see
    /// (validation, conflict and state-machine errors).
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::AggregateNotFound(_)
                | Self::InvalidTransition { .. }
                | Self::Conflict(_)
                | Self::Validation(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message_names_state_and_action() {
        let err = DomainError::InvalidTransition {
            aggregate_id: "AFI-1".to_owned(),
            from: "APPROVED".to_owned(),
            action: "approve",
        };

        assert_eq!(
            err.to_string(),
            "invalid transition from APPROVED on aggregate AFI-1: cannot approve"
        );
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_infrastructure_error_is_not_user_facing() {
        assert!(!DomainError::Infrastructure("db down".into()).is_user_facing());
    }
}
