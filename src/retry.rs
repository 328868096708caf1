//! Retry-with-backoff for operations whose failure is
//! [`AppError::is_retryable`].

use crate::error::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff configuration for [`retry_with_config`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Run `operation` up to `config.max_attempts` times, sleeping with
/// exponential backoff between attempts. Stops immediately (without
/// sleeping or retrying) on the first error for which
/// `AppError::is_retryable` is `false`.
pub async fn retry_with_config<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = config.initial_backoff;
    let mut last_err: Option<AppError> = None;

    for attempt in 1..=config.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt == config.max_attempts {
                    return Err(err);
                }
                warn!(attempt, max_attempts = config.max_attempts, backoff = ?backoff, error = %err, "retrying after transient failure");
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(
                    Duration::from_secs_f64(backoff.as_secs_f64() * config.backoff_multiplier),
                    config.max_backoff,
                );
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| AppError::Internal("retry loop exited without a result".into())))
}
