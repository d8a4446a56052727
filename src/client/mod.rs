//! # Recovery Client
//!
//! Typed façade over the external recovery control plane's job, instance,
//! and server operations. Every call:
//!
//! 1. waits for token-bucket admission on the target (region, account) key,
//! 2. runs under the retry policy, which retries transient error classes
//!    with bounded exponential backoff,
//! 3. carries an explicit [`AccountContext`] capability instead of ambient
//!    credentials.
//!
//! All operations are idempotent-safe to retry by job id / instance id.

pub mod context;
pub mod types;

pub use context::{AccountContext, CapabilityToken};
pub use types::{
    InstanceValidationState, JobDescription, JobStatus, RecoveryClientError, ServerJobRecord,
    ServerLaunchState,
};

use crate::resilience::{BucketKey, RateLimiterRegistry, RetryError, RetryPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Result of a recovery-service call after rate limiting and retries
pub type ClientResult<T> = Result<T, RetryError<RecoveryClientError>>;

/// The external recovery control plane's primitives
///
/// Implementations are transport adapters (HTTP, SDK, test fake); semantics
/// and resilience live in [`RecoveryClient`].
#[async_trait]
pub trait RecoveryApi: Send + Sync {
    /// Start a recovery job for a batch of servers; returns the job id
    async fn start_job(
        &self,
        context: &AccountContext,
        server_ids: &[String],
        drill: bool,
    ) -> Result<String, RecoveryClientError>;

    /// Fetch the authoritative job record, including per-server launch states
    async fn describe_job(
        &self,
        context: &AccountContext,
        job_id: &str,
    ) -> Result<JobDescription, RecoveryClientError>;

    /// Fetch post-launch validation status for one recovery instance
    async fn describe_instance_validation(
        &self,
        context: &AccountContext,
        instance_id: &str,
    ) -> Result<InstanceValidationState, RecoveryClientError>;

    /// Terminate recovery instances (drill teardown / explicit cleanup)
    async fn terminate_instances(
        &self,
        context: &AccountContext,
        instance_ids: &[String],
    ) -> Result<(), RecoveryClientError>;
}

/// Rate-limited, retrying façade over a [`RecoveryApi`] transport
#[derive(Clone)]
pub struct RecoveryClient {
    api: Arc<dyn RecoveryApi>,
    limiter: Arc<RateLimiterRegistry>,
    retry: RetryPolicy,
}

impl RecoveryClient {
    pub fn new(
        api: Arc<dyn RecoveryApi>,
        limiter: Arc<RateLimiterRegistry>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            limiter,
            retry,
        }
    }

    fn bucket_key(context: &AccountContext) -> BucketKey {
        BucketKey::new(context.region.clone(), context.account_id.clone())
    }

    /// Rate-limiter admission mapped into the client error taxonomy so it
    /// participates in retry classification
    async fn admit(&self, key: &BucketKey) -> Result<(), RecoveryClientError> {
        self.limiter
            .acquire(key)
            .await
            .map_err(|e| RecoveryClientError::AdmissionTimeout(e.to_string()))
    }

    pub async fn start_job(
        &self,
        context: &AccountContext,
        server_ids: &[String],
        drill: bool,
    ) -> ClientResult<String> {
        let key = Self::bucket_key(context);
        debug!(
            account_id = %context.account_id,
            region = %context.region,
            servers = server_ids.len(),
            drill,
            "starting recovery job"
        );
        self.retry
            .execute(|| async {
                self.admit(&key).await?;
                self.api.start_job(context, server_ids, drill).await
            })
            .await
    }

    pub async fn describe_job(
        &self,
        context: &AccountContext,
        job_id: &str,
    ) -> ClientResult<JobDescription> {
        let key = Self::bucket_key(context);
        self.retry
            .execute(|| async {
                self.admit(&key).await?;
                self.api.describe_job(context, job_id).await
            })
            .await
    }

    pub async fn describe_instance_validation(
        &self,
        context: &AccountContext,
        instance_id: &str,
    ) -> ClientResult<InstanceValidationState> {
        let key = Self::bucket_key(context);
        self.retry
            .execute(|| async {
                self.admit(&key).await?;
                self.api
                    .describe_instance_validation(context, instance_id)
                    .await
            })
            .await
    }

    pub async fn terminate_instances(
        &self,
        context: &AccountContext,
        instance_ids: &[String],
    ) -> ClientResult<()> {
        let key = Self::bucket_key(context);
        debug!(
            account_id = %context.account_id,
            instances = instance_ids.len(),
            "terminating recovery instances"
        );
        self.retry
            .execute(|| async {
                self.admit(&key).await?;
                self.api.terminate_instances(context, instance_ids).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{RateLimitConfig, RetryConfig};
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Scripted transport: fails `failures` times, then succeeds
    struct FlakyApi {
        failures: Mutex<u32>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl RecoveryApi for FlakyApi {
        async fn start_job(
            &self,
            _context: &AccountContext,
            _server_ids: &[String],
            _drill: bool,
        ) -> Result<String, RecoveryClientError> {
            *self.calls.lock() += 1;
            let mut failures = self.failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(RecoveryClientError::Throttled("busy".into()));
            }
            Ok("job-1".to_string())
        }

        async fn describe_job(
            &self,
            _context: &AccountContext,
            job_id: &str,
        ) -> Result<JobDescription, RecoveryClientError> {
            Err(RecoveryClientError::JobNotFound(job_id.to_string()))
        }

        async fn describe_instance_validation(
            &self,
            _context: &AccountContext,
            _instance_id: &str,
        ) -> Result<InstanceValidationState, RecoveryClientError> {
            Ok(InstanceValidationState::Completed)
        }

        async fn terminate_instances(
            &self,
            _context: &AccountContext,
            _instance_ids: &[String],
        ) -> Result<(), RecoveryClientError> {
            Ok(())
        }
    }

    fn test_client(failures: u32) -> (RecoveryClient, Arc<FlakyApi>) {
        let api = Arc::new(FlakyApi {
            failures: Mutex::new(failures),
            calls: Mutex::new(0),
        });
        let limiter = Arc::new(RateLimiterRegistry::new(RateLimitConfig {
            refill_rate: 10_000.0,
            capacity: 100.0,
            acquire_timeout: Duration::from_millis(100),
        }));
        let client = RecoveryClient::new(
            api.clone(),
            limiter,
            RetryPolicy::new(RetryConfig::for_testing()),
        );
        (client, api)
    }

    fn ctx() -> AccountContext {
        AccountContext {
            account_id: "111".to_string(),
            region: "us-west-2".to_string(),
            capability: CapabilityToken::new("role"),
        }
    }

    #[tokio::test]
    async fn test_start_job_retries_through_throttling() {
        let (client, api) = test_client(2);
        let job_id = client
            .start_job(&ctx(), &["s-1".to_string()], true)
            .await
            .unwrap();
        assert_eq!(job_id, "job-1");
        assert_eq!(*api.calls.lock(), 3);
    }

    #[tokio::test]
    async fn test_start_job_exhausts_on_persistent_throttling() {
        let (client, api) = test_client(10);
        let err = client
            .start_job(&ctx(), &["s-1".to_string()], true)
            .await
            .unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(*api.calls.lock(), 3);
    }

    #[tokio::test]
    async fn test_job_not_found_is_permanent() {
        let (client, _api) = test_client(0);
        let err = client.describe_job(&ctx(), "job-9").await.unwrap_err();
        assert!(matches!(err, RetryError::Permanent(_)));
        assert!(matches!(
            err.source_ref(),
            RecoveryClientError::JobNotFound(_)
        ));
    }
}
