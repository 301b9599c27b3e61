//! Deadline-bounded retry
//!
//! Retries an operation with exponential back-off for as long as its error
//! is classified as retryable and the deadline has not passed.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::context::{Cancellation, OperationContext};

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            with_jitter: true,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy bounded only by time
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(usize::MAX);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// The operation failed with an error that is not retryable
    #[error(transparent)]
    Operation(E),
    /// The error stayed retryable until the deadline passed
    #[error("timeout while waiting for retryable error to clear after {timeout:?}: {last}")]
    Timeout { timeout: Duration, last: E },
    #[error("retry aborted: {0}")]
    Cancelled(Cancellation),
}

impl<E: std::error::Error + 'static> RetryError<E> {
    /// The underlying operation error, if there was one
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Operation(e) | RetryError::Timeout { last: e, .. } => Some(e),
            RetryError::Cancelled(_) => None,
        }
    }
}

/// Run `operation` until it succeeds, fails non-retryably, or `timeout` elapses
///
/// The deadline is the earlier of `timeout` from now and the context's own
/// deadline. An explicit cancel of `ctx` aborts immediately.
pub async fn retry_while<T, E, F, Fut, P>(
    ctx: &OperationContext,
    timeout: Duration,
    config: &RetryConfig,
    is_retryable: P,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
    P: Fn(&E) -> bool,
{
    let bounded = ctx.with_timeout(timeout);
    ctx.check().map_err(RetryError::Cancelled)?;

    let attempts = operation
        .retry(config.clone().into_backoff())
        .sleep(tokio::time::sleep)
        .when(|e| is_retryable(e) && !bounded.deadline_passed())
        .notify(|e, dur| {
            log::debug!("retryable error, retrying in {:?}: {}", dur, e);
        });

    let result = tokio::select! {
        result = attempts => result,
        _ = explicit_cancel(ctx) => return Err(RetryError::Cancelled(Cancellation::Cancelled)),
    };

    result.map_err(|e| {
        if is_retryable(&e) {
            RetryError::Timeout { timeout, last: e }
        } else {
            RetryError::Operation(e)
        }
    })
}

/// Resolve only on an explicit cancel, never on the deadline
async fn explicit_cancel(ctx: &OperationContext) {
    // The retry predicate owns deadline handling so the last error survives.
    if ctx.cancelled().await == Cancellation::DeadlineExceeded {
        std::future::pending::<()>().await;
    }
}
