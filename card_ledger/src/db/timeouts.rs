//! Database query timeout helpers
//!
//! Provides timeout wrappers for database operations so that no ledger call
//! hangs indefinitely.

use crate::errors::{LedgerError, LedgerResult};
use std::time::Duration;
use tokio::time::timeout;

/// Default timeout for database queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for timeout operations
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    /// Operation timed out
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for timeout operations
pub type TimeoutResult<T> = Result<T, TimeoutError>;

/// Execute a query with timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> TimeoutResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(TimeoutError::Database(e)),
        Err(_) => Err(TimeoutError::Timeout(duration)),
    }
}

/// Execute a query with default timeout (5 seconds)
pub async fn with_default_timeout<F, T>(future: F) -> TimeoutResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

/// Run a whole atomic unit under a time budget
///
/// When the budget elapses the unit's future is dropped, which drops its open
/// transaction and rolls it back, and `LedgerError::Timeout` is returned.
pub async fn bounded<F, T>(duration: Duration, unit: F) -> LedgerResult<T>
where
    F: std::future::Future<Output = LedgerResult<T>>,
{
    match timeout(duration, unit).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout(duration)),
    }
}
