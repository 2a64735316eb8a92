//! Mercado accounts backend: Zone Affiliation bounded context.
//!
//! A rural zone (hamlet) asks to join the marketplace; a global
//! administrator approves or rejects the request.

pub mod application;
pub mod domain;
