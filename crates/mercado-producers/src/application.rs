//! Application layer for the Producer Application context.

pub mod command_handlers;
