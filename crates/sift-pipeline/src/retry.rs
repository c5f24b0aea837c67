//! Retry with exponential back-off for fallible external calls.
//!
//! Each attempt reports whether its failure is worth retrying through
//! [`AttemptError`], so the retry decision is made by the caller's types
//! rather than by the executor. The executor never holds a lock while it
//! sleeps; callers must not hold one across [`retry_with_backoff`] either.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Outcome of one failed attempt.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// Worth another try after a back-off delay.
    Retryable(E),
    /// Returned to the caller immediately; consumes no retry.
    Fatal(E),
}

impl<E> AttemptError<E> {
    #[must_use]
    pub fn into_inner(self) -> E {
        match self {
            AttemptError::Retryable(e) | AttemptError::Fatal(e) => e,
        }
    }
}

impl AttemptError<sift_db::DbError> {
    /// Classify a database error by [`sift_db::DbError::is_transient`].
    #[must_use]
    pub fn from_db(err: sift_db::DbError) -> Self {
        if err.is_transient() {
            AttemptError::Retryable(err)
        } else {
            AttemptError::Fatal(err)
        }
    }
}

/// Back-off schedule for [`retry_with_backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Scale each delay by a random factor in `[0.75, 1.25)`, still capped at `max_delay`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_app_config(config: &sift_core::AppConfig) -> Self {
        Self {
            max_retries: config.retry_max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            jitter: false,
        }
    }

    /// Delay before retry `retry` (0-indexed): `min(base * 2^retry, max)`.
    ///
    /// | Retry | Delay (base 1 s, max 30 s) |
    /// |-------|----------------------------|
    /// | 0     | 1 s                        |
    /// | 1     | 2 s                        |
    /// | 2     | 4 s                        |
    /// | 5     | 30 s (capped)              |
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 1_u32 << retry.min(31);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        delay
            .mul_f64(rand::random::<f64>() * 0.5 + 0.75)
            .min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds, fails fatally, or exhausts
/// `policy.max_retries` retries.
///
/// The first attempt runs immediately. After the `k`-th retryable failure
/// (0-indexed) the task sleeps [`RetryPolicy::delay_for_retry`]`(k)`. With
/// `max_retries = 3` the operation runs at most 4 times. The last error is
/// always returned, never swallowed.
///
/// # Errors
///
/// Returns the error of a [`AttemptError::Fatal`] attempt immediately, or
/// the error of the final [`AttemptError::Retryable`] attempt once retries
/// are exhausted.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
{
    let mut retries = 0_u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(err)) => return Err(err),
            Err(AttemptError::Retryable(err)) => {
                if retries >= policy.max_retries {
                    tracing::warn!(
                        attempts = retries + 1,
                        error = %err,
                        "retries exhausted; giving up"
                    );
                    return Err(err);
                }
                let delay = policy.jittered(policy.delay_for_retry(retries));
                retries += 1;
                #[allow(clippy::cast_possible_truncation)]
                let delay_ms = delay.as_millis() as u64;
                tracing::warn!(
                    attempt = retries,
                    max_retries = policy.max_retries,
                    delay_ms,
                    error = %err,
                    "transient error; retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// [`retry_with_backoff`] treating every failure as retryable.
///
/// # Errors
///
/// Returns the last error once retries are exhausted.
pub async fn retry_any<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_backoff(policy, || {
        let fut = operation();
        async move { fut.await.map_err(AttemptError::Retryable) }
    })
    .await
}
