//! Field checks shared by the command-side aggregates.
//!
//! Length limits count characters, matching `VARCHAR(n)` in the read-model
//! tables, so anything an aggregate accepts can always be projected.

use crate::error::DomainError;

/// Longest user, admin or zone identifier.
pub const MAX_ID_LEN: usize = 100;

/// Longest personal or place name.
pub const MAX_NAME_LEN: usize = 200;

/// Longest email address.
pub const MAX_EMAIL_LEN: usize = 200;

/// Longest identity document number.
pub const MAX_DOCUMENT_LEN: usize = 50;

/// Longest phone number.
pub const MAX_PHONE_LEN: usize = 50;

/// Longest postal address.
pub const MAX_ADDRESS_LEN: usize = 300;

/// Fails unless `value` has non-whitespace content.
///
/// # Errors
///
/// Returns `DomainError::Validation` naming `field`.
pub fn require(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Fails if `value` is longer than `max` characters.
///
/// # Errors
///
/// Returns `DomainError::Validation` naming `field` and the limit.
pub fn max_len(field: &str, value: &str, max: usize) -> Result<(), DomainError> {
    if value.chars().count() > max {
        return Err(DomainError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// [`require`] plus [`max_len`].
///
/// # Errors
///
/// Returns `DomainError::Validation` naming `field`.
pub fn require_within(field: &str, value: &str, max: usize) -> Result<(), DomainError> {
    require(field, value)?;
    max_len(field, value, max)
}

/// A required, bounded email address containing `@`.
///
/// # Errors
///
/// Returns `DomainError::Validation` naming `field`.
pub fn require_email(field: &str, value: &str) -> Result<(), DomainError> {
    require_within(field, value, MAX_EMAIL_LEN)?;
    if !value.contains('@') {
        return Err(DomainError::Validation(format!(
            "{field} is not a valid email address"
        )));
    }
    Ok(())
}
