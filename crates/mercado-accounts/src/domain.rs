//! Domain layer for the User Accounts context.

pub mod aggregates;
pub mod commands;
pub mod events;
