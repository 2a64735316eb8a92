//! PostgreSQL command store and transactional outbox.
//!
//! [`pg_aggregate_repository`] writes aggregate state and outbox rows in one
//! transaction; [`pg_outbox_store`] leases and settles those rows; and
//! [`publisher`] moves them onto the transport.

pub mod pg_aggregate_repository;
pub mod pg_outbox_store;
pub mod publisher;
pub mod schema;
