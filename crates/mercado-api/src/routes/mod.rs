//! Route modules organized by bounded context.

pub mod affiliations;
pub mod health;
pub mod outbox;
pub mod producer_applications;
pub mod users;
