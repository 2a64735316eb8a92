//! Domain layer for the Zone Affiliation context.

pub mod aggregates;
pub mod commands;
pub mod details;
pub mod events;
