//! Combined health check helpers.

use std::future::Future;

use deadpool_postgres::Pool;
use tokio::time::Instant;

use crate::error::{AdapterError, Result};

/// Runs `fut` against a deadline shared with other checks.
pub(crate) async fn within<T>(
    deadline: Instant,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Timeout(format!(
            "{} did not respond before the deadline",
            what
        ))),
    }
}

/// Checks out a pooled connection and round-trips a trivial statement.
pub(crate) async fn ping_pool(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;
    client.simple_query("SELECT 1").await?;
    Ok(())
}

/// Folds the two check outcomes into one.
///
/// Healthy only when both succeed. A single failure is returned as-is; two
/// failures are reported together so neither cause is hidden.
pub fn combine(cache: Result<()>, database: Result<()>) -> Result<()> {
    match (cache, database) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(cache), Err(database)) => Err(AdapterError::Unhealthy {
            cache: cache.to_string(),
            database: database.to_string(),
        }),
    }
}
