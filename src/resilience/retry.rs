//! # Retry Policy
//!
//! Wraps a single external-API call with bounded exponential backoff plus
//! jitter. Only error classes the callee reports as transient are retried;
//! validation, not-found, and permission errors propagate immediately
//! without consuming an attempt.
//!
//! Exhausting the attempt budget raises [`RetryError::Exhausted`] carrying
//! the last underlying error and the attempt count, so callers can alert
//! differently than on a first-attempt failure.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Classification hook: errors decide for themselves whether a retry can help
pub trait RetryClass {
    fn is_transient(&self) -> bool;
}

/// Retry-loop parameters
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Backoff ceiling
    pub max_delay: Duration,
    /// Uniform random jitter added on top of the computed delay
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryConfig {
    /// Fast settings for tests: real backoff shape, negligible wall time
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter: Duration::ZERO,
        }
    }
}

/// Outcome of a wrapped call that did not succeed
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// Every attempt failed with a transient error
    #[error("retries exhausted after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
    /// A non-retryable error propagated immediately
    #[error(transparent)]
    Permanent(E),
}

impl<E: std::error::Error + 'static> RetryError<E> {
    /// The underlying service error, whichever path produced it
    pub fn into_source(self) -> E {
        match self {
            Self::Exhausted { source, .. } => source,
            Self::Permanent(source) => source,
        }
    }

    pub fn source_ref(&self) -> &E {
        match self {
            Self::Exhausted { source, .. } => source,
            Self::Permanent(source) => source,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Bounded exponential backoff executor
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay before retrying the given 0-indexed attempt:
    /// `min(max_delay, base_delay * 2^attempt) + random_jitter`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self
            .config
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let capped = exp.min(self.config.max_delay);
        let jitter_ms = self.config.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return capped;
        }
        capped + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    /// `op` is invoked at most `max_attempts` times.
    pub async fn execute<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + RetryClass + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => {
                    return Err(RetryError::Permanent(err));
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.config.max_attempts {
                        warn!(
                            attempts = attempt,
                            error = %err,
                            "retries exhausted"
                        );
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    let delay = self.delay_for_attempt(attempt - 1);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient error, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("throttled")]
        Throttled,
        #[error("not found")]
        NotFound,
    }

    impl RetryClass for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, Self::Throttled)
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_k_transient_failures() {
        let policy = RetryPolicy::new(RetryConfig::for_testing());
        let calls = AtomicU32::new(0);

        let result: Result<&str, _> = policy
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError::Throttled)
                    } else {
                        Ok("recovered")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "recovered");
        // k = 2 failures, then success: exactly k + 1 invocations
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_after_exactly_max_attempts() {
        let policy = RetryPolicy::new(RetryConfig::for_testing());
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Throttled) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_propagates_without_retry() {
        let policy = RetryPolicy::new(RetryConfig::for_testing());
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::NotFound) }
            })
            .await;

        assert!(matches!(result.unwrap_err(), RetryError::Permanent(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_shape_is_capped_exponential() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter: Duration::ZERO,
        });
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
    }

    #[test]
    fn test_jitter_stays_within_range() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            jitter: Duration::from_millis(50),
        });
        for _ in 0..100 {
            let delay = policy.delay_for_attempt(0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }
}
