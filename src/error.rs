// Error types for the host/route enumerator

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Lookup tool not found: {0}")]
    ToolNotFound(String),

    #[error("Failed to execute command: {0}")]
    CommandExecution(String),

    #[error("Lookup timed out: {0}")]
    LookupTimeout(String),

    #[error("Invalid CIDR for route: {0}")]
    InvalidCidr(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// How far an error propagates through an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prerequisites are broken; nothing is recorded
    StartupFatal,
    /// The run aborts mid-way and its transaction is never committed
    RunFatal,
    /// Only the current hostname fails; the run continues
    PerHostRecoverable,
}

impl AppError {
    /// Convert error to user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AppError::ToolNotFound(tool) => {
                format!("Must have `{}` binary in $PATH.", tool)
            }
            AppError::CommandExecution(cmd) => {
                format!("Failed to run the lookup tool: {}", cmd)
            }
            AppError::LookupTimeout(query) => {
                format!("Registry lookup for {} did not finish in time.", query)
            }
            AppError::InvalidCidr(route) => {
                format!("The registry returned an unparseable route ({}). Check the lookup tool output.", route)
            }
            AppError::Storage(_) => {
                "Database error. Check the output path and disk space.".to_string()
            }
            AppError::Io(_) => {
                "File system error. Check permissions and that the host list exists.".to_string()
            }
            AppError::InvalidInput(_) => {
                "Invalid input. The host list must be newline-delimited text.".to_string()
            }
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AppError::CommandExecution(_) | AppError::LookupTimeout(_) => {
                Severity::PerHostRecoverable
            }
            AppError::InvalidCidr(_) => Severity::RunFatal,
            _ => Severity::StartupFatal,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::CommandExecution(_) | AppError::LookupTimeout(_)
        )
    }
}

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 1,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = (self.initial_delay_ms as f64)
            * self.backoff_multiplier.powi(attempt as i32);
        delay.min(self.max_delay_ms as f64) as u64
    }
}

/// Retry a fallible operation with exponential backoff.
///
/// Errors that are not retryable are returned immediately.
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = AppResult<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(
                        "{} succeeded after {} attempt(s)",
                        operation_name,
                        attempt + 1
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                attempt += 1;

                if !e.is_retryable() || attempt >= config.max_attempts {
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt - 1);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {}ms...",
                    operation_name,
                    attempt,
                    config.max_attempts,
                    e,
                    delay
                );

                tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_config_delay() {
        let config = RetryConfig {
            initial_delay_ms: 100,
            ..RetryConfig::default()
        };
        assert_eq!(config.delay_for_attempt(0), 100);
        assert_eq!(config.delay_for_attempt(1), 200);
        assert_eq!(config.delay_for_attempt(2), 400);
        assert_eq!(config.delay_for_attempt(10), 5000);
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            AppError::ToolNotFound("whois".to_string()).severity(),
            Severity::StartupFatal
        );
        assert_eq!(
            AppError::InvalidCidr("bogus".to_string()).severity(),
            Severity::RunFatal
        );
        assert_eq!(
            AppError::LookupTimeout("192.0.2.1".to_string()).severity(),
            Severity::PerHostRecoverable
        );
    }

    #[test]
    fn test_error_retryable() {
        assert!(AppError::CommandExecution("test".to_string()).is_retryable());
        assert!(AppError::LookupTimeout("test".to_string()).is_retryable());
        assert!(!AppError::InvalidCidr("test".to_string()).is_retryable());
        assert!(!AppError::ToolNotFound("test".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn test_retry_stops_at_max_attempts() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 1,
            backoff_multiplier: 1.0,
        };

        let result: AppResult<()> = retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::CommandExecution("whois".to_string())) }
            },
            &config,
            "lookup",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_skips_non_retryable() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 5,
            ..RetryConfig::default()
        };

        let result: AppResult<()> = retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AppError::InvalidCidr("x".to_string())) }
            },
            &config,
            "lookup",
        )
        .await;

        assert!(matches!(result, Err(AppError::InvalidCidr(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
