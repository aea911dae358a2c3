//! Time budgets and blocking offload for external calls

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Run `fut` under a time budget, mapping expiry to `Error::Timeout`
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, limit)),
    }
}

/// Run a synchronous closure on the blocking pool
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
}
