//! Retry for transient SQLite lock contention
//!
//! Per-business tasks update the tracker concurrently; SQLite serializes
//! writers, so an update can hit `database is locked` under load.

use std::time::{Duration, Instant};

use crate::error::{MigrationError, MigrationResult};

/// Default total time to keep retrying a locked write
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

fn is_lock_error(err: &MigrationError) -> bool {
    match err {
        MigrationError::Database(db_err) => {
            let message = db_err.to_string();
            message.contains("database is locked") || message.contains("database table is locked")
        }
        _ => false,
    }
}

/// Retry `operation` with exponential backoff while it fails on a lock
///
/// Backoff starts at 10ms and doubles up to 1000ms. Other errors return
/// immediately.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> MigrationResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = MigrationResult<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !is_lock_error(&err) => return Err(err),
            Err(err) => {
                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database still locked, giving up"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}
