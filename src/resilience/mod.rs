//! # Resilience Patterns
//!
//! Rate limiting and retry primitives that protect the external recovery
//! service: a lazily-refilled token bucket per (region, account) key, and a
//! bounded exponential-backoff retry policy with jitter. Every recovery-API
//! call passes through both.

pub mod retry;
pub mod token_bucket;

pub use retry::{RetryClass, RetryConfig, RetryError, RetryPolicy};
pub use token_bucket::{
    BucketKey, RateLimitConfig, RateLimitError, RateLimiterRegistry, TokenBucket,
};
