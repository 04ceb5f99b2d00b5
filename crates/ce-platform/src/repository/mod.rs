//! Repository Layer
//!
//! Parameterized SQL behind per-entity repositories. The relational store is
//! the single source of truth; every read re-queries it. Timestamps are
//! stored as BIGINT unix-milliseconds. Every call is bounded by a deadline so
//! a stalled store surfaces as `Timeout` rather than a hung request.

pub mod event;
pub mod registration;
pub mod user;

pub use event::{EventFilter, EventRepository};
pub use registration::{RegistrationFilter, RegistrationRepository};
pub use user::UserRepository;

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::{ApiError, Result};

/// Deadline applied to every repository operation.
pub const DB_DEADLINE: Duration = Duration::from_secs(5);

/// Open a pool against `database_url`, creating the file if missing and
/// enforcing foreign keys so event/user deletion cascades to registrations.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| ApiError::internal(format!("invalid database url: {}", e)))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// In-memory pool for tests. A single connection, or each pooled connection
/// would see its own empty database.
pub async fn memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| ApiError::internal(format!("invalid database url: {}", e)))?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Run a repository operation under [`DB_DEADLINE`].
pub(crate) async fn bounded<T, F>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(DB_DEADLINE, fut).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout),
    }
}

pub(crate) fn millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| ApiError::internal(format!("invalid timestamp: {}", ms)))
}
