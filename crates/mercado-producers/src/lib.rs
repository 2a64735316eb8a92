//! Mercado accounts backend: Producer Application bounded context.
//!
//! A producer asks to sell through an affiliated zone; an administrator of
//! that zone approves or rejects the application. Approval makes the
//! producer a `PRODUCER` member of the zone.

pub mod application;
pub mod domain;
