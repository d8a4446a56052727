//! # Token-Bucket Rate Limiter
//!
//! One bucket per (region, account) key protects the recovery service's
//! strict API rate limits. Refill is computed lazily from elapsed time on
//! every acquire attempt, never by a background timer task, so the bucket
//! carries no state beyond a token count and a last-refill instant.
//!
//! Buckets live in an explicit registry owned by the process and passed by
//! reference to all callers; there is no module-level global.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Token-bucket parameters
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Tokens added per second
    pub refill_rate: f64,
    /// Maximum tokens the bucket can hold
    pub capacity: f64,
    /// How long `acquire` waits for admission before giving up
    pub acquire_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            refill_rate: 10.0,
            capacity: 20.0,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Errors raised by rate-limiter admission
#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimitError {
    #[error("timed out after {waited_ms}ms waiting for rate-limiter admission on {key}")]
    AcquireTimeout { key: BucketKey, waited_ms: u64 },
}

/// Bucket identity: one bucket per external region/account pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub region: String,
    pub account_id: String,
}

impl BucketKey {
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account_id: account_id.into(),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.account_id)
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A single token bucket, safe for concurrent use by many callers
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            capacity: config.capacity,
            refill_rate: config.refill_rate,
            state: Mutex::new(BucketState {
                tokens: config.capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Refill from elapsed time, capped at capacity. Caller holds the lock.
    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
            state.last_refill = now;
        }
    }

    /// Non-blocking admission attempt
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Block (suspend) until a token is available or the timeout elapses
    pub async fn acquire(&self, key: &BucketKey, timeout: Duration) -> Result<(), RateLimitError> {
        let started = Instant::now();
        loop {
            let wait = {
                let mut state = self.state.lock();
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                // Time until one whole token accrues
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_rate)
            };

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                debug!(key = %key, waited_ms = elapsed.as_millis() as u64, "rate limiter admission timed out");
                return Err(RateLimitError::AcquireTimeout {
                    key: key.clone(),
                    waited_ms: elapsed.as_millis() as u64,
                });
            }

            let remaining = timeout - elapsed;
            trace!(key = %key, wait_ms = wait.as_millis() as u64, "waiting for token refill");
            tokio::time::sleep(wait.min(remaining)).await;
        }
    }

    /// Current token count after lazy refill. Intended for tests and metrics.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }
}

/// Registry of token buckets keyed by (region, account), created lazily and
/// cached for the process lifetime
#[derive(Debug)]
pub struct RateLimiterRegistry {
    buckets: DashMap<BucketKey, Arc<TokenBucket>>,
    config: RateLimitConfig,
}

impl RateLimiterRegistry {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    /// Get or lazily create the bucket for a key
    pub fn bucket(&self, key: &BucketKey) -> Arc<TokenBucket> {
        self.buckets
            .entry(key.clone())
            .or_insert_with(|| Arc::new(TokenBucket::new(&self.config)))
            .clone()
    }

    /// Admission with the registry's default timeout
    pub async fn acquire(&self, key: &BucketKey) -> Result<(), RateLimitError> {
        self.bucket(key)
            .acquire(key, self.config.acquire_timeout)
            .await
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
