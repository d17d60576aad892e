use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::{AppError, Result};

/// Backoff settings for retried database operations
#[derive(Debug, Clone)]
pub struct DatabaseRetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for DatabaseRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl DatabaseRetryConfig {
    fn next_delay(&self, delay: u64) -> u64 {
        (((delay as f64) * self.backoff_multiplier) as u64).min(self.max_delay_ms)
    }
}

/// Runs `operation` until it succeeds or `max_retries` attempts have failed.
/// Only database errors are retried; anything else is returned at once.
pub async fn retry_database_operation<F, Fut, T>(operation: F, config: DatabaseRetryConfig) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = config.initial_delay_ms;
    let mut last_error = AppError::DatabaseError("Operation was not attempted".to_string());

    for attempt in 1..=config.max_retries {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!("Database operation succeeded on attempt {}", attempt);
                }
                return Ok(result);
            }
            Err(e @ AppError::DatabaseError(_)) => {
                last_error = e;
                if attempt < config.max_retries {
                    tracing::warn!(
                        "Database attempt {}/{} failed: {}, retrying in {}ms",
                        attempt,
                        config.max_retries,
                        last_error,
                        delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                    delay = config.next_delay(delay);
                }
            }
            Err(e) => return Err(e),
        }
    }

    tracing::error!("All {} database attempts failed: {}", config.max_retries, last_error);
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> DatabaseRetryConfig {
        DatabaseRetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result = retry_database_operation(
            || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AppError::DatabaseError("connection refused".to_string()))
                } else {
                    Ok(42)
                }
            },
            quick(),
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = retry_database_operation(
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(AppError::ValidationError("bad".to_string()))
            },
            quick(),
        )
        .await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = DatabaseRetryConfig::default();
        assert_eq!(config.next_delay(200), 400);
        assert_eq!(config.next_delay(4000), 5000);
    }
}
