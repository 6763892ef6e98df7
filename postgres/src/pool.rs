//! Connection pool construction.

use crate::database_error;
use nomadhub_core::repository::PersistenceError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connection string
    pub url: String,
    /// Upper bound on open connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// How long to wait for a connection before failing
    pub connect_timeout: Duration,
}

impl PoolConfig {
    /// Defaults for `url`: 10 connections max, 1 min, 30s timeout.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Open a pool.
///
/// # Errors
///
/// Returns [`PersistenceError::Database`] if the database is unreachable.
pub async fn connect(config: &PoolConfig) -> Result<PgPool, PersistenceError> {
    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connecting to database"
    );
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| database_error(&e))
}

/// Round-trip a trivial statement, for readiness checks.
///
/// # Errors
///
/// Returns [`PersistenceError::Database`] if the statement fails.
pub async fn ping(pool: &PgPool) -> Result<(), PersistenceError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| database_error(&e))
}
