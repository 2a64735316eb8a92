//! Mercado accounts backend: read models.
//!
//! Consumes affiliation and producer application events from the transport
//! and keeps the denormalised `affiliation_views` and
//! `producer_application_views` tables current. Every handled event is
//! recorded in the shared `processed_events` ledger, so redeliveries are
//! no-ops, and a view only moves forward in aggregate version.

pub mod handler;
pub mod pg_producer_store;
pub mod pg_projection_store;
pub mod producer_queries;
pub mod producer_view;
pub mod projector;
pub mod queries;
pub mod view;
