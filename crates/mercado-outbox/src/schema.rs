//! Database schema.
//!
//! The SQL lives in the workspace `migrations/` directory and is embedded
//! here so the binary can apply it at startup.

use sqlx::migrate::Migrator;

/// Migrations for the command store, outbox, ledger and read models.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");
