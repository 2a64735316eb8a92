//! Mercado accounts backend: User Accounts bounded context.
//!
//! Users, their global roles and their per-zone memberships. Reacts to
//! approved zone affiliations by making the requester the zone's admin.

pub mod application;
pub mod domain;
