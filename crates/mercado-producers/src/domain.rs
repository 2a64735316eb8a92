//! Domain layer for the Producer Application context.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod profile;
