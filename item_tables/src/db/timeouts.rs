//! Timeouts for store calls.
//!
//! A hung connection surfaces as [`TimeoutError::Timeout`] rather than
//! blocking the caller. Nothing is retried.

use std::time::Duration;
use tokio::time::timeout;

/// Per-call budget of a table store unless configured otherwise
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Lower bound for multi-statement transactions
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type TimeoutResult<T> = Result<T, TimeoutError>;

/// Run a sqlx future, failing with [`TimeoutError::Timeout`] once `duration`
/// elapses
///
/// ```no_run
/// use item_tables::db::timeouts::{DEFAULT_QUERY_TIMEOUT, with_timeout};
/// # async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let row = with_timeout(
///     DEFAULT_QUERY_TIMEOUT,
///     sqlx::query("SELECT id FROM item_tables WHERE name = $1")
///         .bind("INVENTORY")
///         .fetch_optional(pool),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
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
