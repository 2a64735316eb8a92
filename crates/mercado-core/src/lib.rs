//! Mercado Core: shared domain and pipeline abstractions.
//!
//! This crate defines the traits and types that the bounded contexts, the
//! outbox, the messaging layer and the projections all agree on. It contains
//! no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod event_factory;
pub mod outbox;
pub mod projection;
pub mod repository;
pub mod retry;
pub mod transport;
pub mod validation;
