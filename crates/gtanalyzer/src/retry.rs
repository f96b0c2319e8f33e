//! Shared retry utilities for upstream calls.
//!
//! Both backend clients wrap every request in [`with_retry`] so rate-limited
//! or dropped requests back off exponentially instead of failing the entity
//! outright. Combined with the transport timeout this bounds how long a single
//! upstream call can stall a batch.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::analysis::{AnalysisProgress, ProgressCallback};

/// Initial backoff delay for retries (milliseconds).
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Upper bound on a single backoff delay (milliseconds).
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Default number of retries after the first attempt.
pub const MAX_RETRIES: usize = 5;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            max_retries: MAX_RETRIES,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    /// A configuration that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Execute an upstream operation, retrying errors accepted by `is_retryable`.
///
/// - Tracks retry attempts with an atomic counter
/// - Uses the exponential backoff described by `config`
/// - Reports each backoff via `RateLimitBackoff` progress events
///
/// # Arguments
///
/// * `operation` - The async operation to retry.
/// * `is_retryable` - Decides whether an error is worth another attempt.
/// * `short_message` - Extracts a one-line message for logging.
/// * `resource` - Label for the upstream resource (used in progress and logs).
/// * `config` - Backoff parameters.
/// * `on_progress` - Optional callback for reporting retry progress.
///
/// # Example
///
/// ```ignore
/// use gtanalyzer::retry::{RetryConfig, with_retry};
///
/// let branches = with_retry(
///     || async { client.fetch("/repos/o/r/branches").await },
///     is_retryable,
///     short_error_message,
///     "/repos/o/r/branches",
///     &RetryConfig::default(),
///     None,
/// ).await?;
/// ```
pub async fn with_retry<T, E, F, Fut, IsRetryable, ShortMsg>(
    mut operation: F,
    is_retryable: IsRetryable,
    short_message: ShortMsg,
    resource: &str,
    config: &RetryConfig,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
    IsRetryable: Fn(&E) -> bool + Send + Sync + 'static,
    ShortMsg: Fn(&E) -> String + Send + Sync + 'static,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.clone().into_backoff())
        .notify(|err, dur| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            if let Some(cb) = on_progress {
                cb(AnalysisProgress::RateLimitBackoff {
                    resource: resource.to_string(),
                    retry_after_ms: dur.as_millis() as u64,
                    attempt: current_attempt,
                });
            }
            tracing::debug!(
                resource,
                attempt = current_attempt,
                retry_in_ms = dur.as_millis() as u64,
                error = %short_message(err),
                "Retrying upstream request"
            );
        })
        .when(is_retryable)
        .await
}
