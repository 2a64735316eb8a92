//! Server and worker configuration read from the environment.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use mercado_core::retry::RetryPolicy;
use mercado_outbox::publisher::PublisherConfig;
use uuid::Uuid;

use crate::error::AppError;

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Upper bound on pooled connections.
    pub database_max_connections: u32,
    /// Whether to run the publisher and consumers in this process.
    pub run_workers: bool,
    /// Outbox publisher settings.
    pub publisher: PublisherConfig,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or any value
    /// does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or any value
    /// does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL environment variable must be set".into()))?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port: u16 = parse_or(&lookup, "PORT", 3000)?;
        let database_max_connections: u32 = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let poll_interval_ms: u64 = parse_or(&lookup, "OUTBOX_POLL_INTERVAL_MS", 5000)?;
        let batch_size: i64 = parse_or(&lookup, "OUTBOX_BATCH_SIZE", 100)?;
        let lease_secs: u64 = parse_or(&lookup, "OUTBOX_LEASE_SECS", 30)?;
        let max_attempts: u32 = parse_or(&lookup, "OUTBOX_MAX_ATTEMPTS", 5)?;
        let instance_id = lookup("PUBLISHER_INSTANCE_ID")
            .unwrap_or_else(|| format!("publisher-{}", Uuid::new_v4()));
        let run_workers = match lookup("RUN_WORKERS") {
            None => true,
            Some(raw) => parse_flag(&raw)?,
        };

        if batch_size < 1 {
            return Err(AppError::Config("OUTBOX_BATCH_SIZE must be at least 1".into()));
        }
        if max_attempts < 1 {
            return Err(AppError::Config("OUTBOX_MAX_ATTEMPTS must be at least 1".into()));
        }

        Ok(Self {
            database_url,
            host,
            port,
            database_max_connections,
            run_workers,
            publisher: PublisherConfig {
                instance_id,
                batch_size,
                poll_interval: Duration::from_millis(poll_interval_ms),
                lease_duration: Duration::from_secs(lease_secs),
                retry: RetryPolicy::builder().max_attempts(max_attempts).build(),
            },
        })
    }

    /// Socket address the server listens on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
    }
}

fn parse_flag(raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(AppError::Config(format!("RUN_WORKERS is invalid: {other}"))),
    }
}
