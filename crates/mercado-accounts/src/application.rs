//! Application layer for the User Accounts context.

pub mod command_handlers;
pub mod membership_reactor;
