//! Application layer for the Zone Affiliation context.

pub mod command_handlers;
