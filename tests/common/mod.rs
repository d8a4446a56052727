//! Shared integration-test fixtures: a scripted in-process recovery service
//! plus a fully wired orchestration harness over the in-memory store.

// Each test binary uses a different slice of the harness.
#![allow(dead_code)]

use async_trait::async_trait;
use failover_core::client::{
    AccountContext, CapabilityToken, InstanceValidationState, JobDescription, JobStatus,
    RecoveryApi, RecoveryClient, RecoveryClientError, ServerJobRecord, ServerLaunchState,
};
use failover_core::events::EventPublisher;
use failover_core::models::{AccountProfile, AccountRegistry, FailurePolicy, PlanWave, RecoveryPlan};
use failover_core::orchestration::{
    AccountPartitioner, CompletionPoller, PollerConfig, WaveCoordinator, WaveCoordinatorConfig,
};
use failover_core::resilience::{RateLimitConfig, RateLimiterRegistry, RetryConfig, RetryPolicy};
use failover_core::store::InMemoryExecutionStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted per-server state sequence. Each describe returns the current
/// state then advances; the final state is sticky.
struct Script<T: Copy> {
    states: Vec<T>,
    index: usize,
}

impl<T: Copy> Script<T> {
    fn new(states: Vec<T>) -> Self {
        Self { states, index: 0 }
    }

    fn take(&mut self) -> T {
        let state = self.states[self.index];
        if self.index + 1 < self.states.len() {
            self.index += 1;
        }
        state
    }
}

struct JobRecord {
    server_ids: Vec<String>,
}

/// In-process stand-in for the external recovery service.
///
/// Launch progress and validation outcomes are scripted per server before
/// the test starts the execution; unscripted servers launch immediately.
pub struct FakeRecoveryService {
    next_job: AtomicU32,
    jobs: Mutex<HashMap<String, JobRecord>>,
    launch_scripts: Mutex<HashMap<String, Script<ServerLaunchState>>>,
    validation_scripts: Mutex<HashMap<String, Script<InstanceValidationState>>>,
    start_failures: Mutex<HashMap<String, u32>>,
    describe_failures: Mutex<HashMap<String, u32>>,
    describe_calls: Mutex<HashMap<String, u32>>,
    terminated: Mutex<Vec<String>>,
}

impl FakeRecoveryService {
    pub fn new() -> Self {
        Self {
            next_job: AtomicU32::new(1),
            jobs: Mutex::new(HashMap::new()),
            launch_scripts: Mutex::new(HashMap::new()),
            validation_scripts: Mutex::new(HashMap::new()),
            start_failures: Mutex::new(HashMap::new()),
            describe_failures: Mutex::new(HashMap::new()),
            describe_calls: Mutex::new(HashMap::new()),
            terminated: Mutex::new(Vec::new()),
        }
    }

    /// Script the launch states one server reports on successive describes
    pub fn script_launch(&self, server_id: &str, states: Vec<ServerLaunchState>) {
        self.launch_scripts
            .lock()
            .insert(server_id.to_string(), Script::new(states));
    }

    /// Script the validation states one server's instance reports
    pub fn script_validation(&self, server_id: &str, states: Vec<InstanceValidationState>) {
        self.validation_scripts
            .lock()
            .insert(server_id.to_string(), Script::new(states));
    }

    /// Fail the next `count` StartJob calls against an account with a
    /// permanent error
    pub fn fail_next_starts(&self, account_id: &str, count: u32) {
        self.start_failures
            .lock()
            .insert(account_id.to_string(), count);
    }

    /// Fail the next `count` transport-level DescribeJob calls for a job
    /// with a transient error
    pub fn fail_next_describes(&self, job_id: &str, count: u32) {
        self.describe_failures
            .lock()
            .insert(job_id.to_string(), count);
    }

    /// Successful transport-level DescribeJob calls observed for a job
    pub fn describe_calls(&self, job_id: &str) -> u32 {
        self.describe_calls.lock().get(job_id).copied().unwrap_or(0)
    }

    pub fn terminated_instances(&self) -> Vec<String> {
        self.terminated.lock().clone()
    }

    pub fn instance_for(server_id: &str) -> String {
        format!("i-{server_id}")
    }
}

impl Default for FakeRecoveryService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecoveryApi for FakeRecoveryService {
    async fn start_job(
        &self,
        context: &AccountContext,
        server_ids: &[String],
        _drill: bool,
    ) -> Result<String, RecoveryClientError> {
        {
            let mut failures = self.start_failures.lock();
            if let Some(remaining) = failures.get_mut(&context.account_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(RecoveryClientError::InvalidRequest(format!(
                        "launch rejected for account {}",
                        context.account_id
                    )));
                }
            }
        }

        let job_id = format!("job-{}", self.next_job.fetch_add(1, Ordering::SeqCst));
        let mut scripts = self.launch_scripts.lock();
        for server_id in server_ids {
            scripts
                .entry(server_id.clone())
                .or_insert_with(|| Script::new(vec![ServerLaunchState::Launched]));
        }
        self.jobs.lock().insert(
            job_id.clone(),
            JobRecord {
                server_ids: server_ids.to_vec(),
            },
        );
        Ok(job_id)
    }

    async fn describe_job(
        &self,
        _context: &AccountContext,
        job_id: &str,
    ) -> Result<JobDescription, RecoveryClientError> {
        {
            let mut failures = self.describe_failures.lock();
            if let Some(remaining) = failures.get_mut(job_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(RecoveryClientError::NetworkTimeout(
                        "scripted transport failure".to_string(),
                    ));
                }
            }
        }

        let jobs = self.jobs.lock();
        let job = jobs
            .get(job_id)
            .ok_or_else(|| RecoveryClientError::JobNotFound(job_id.to_string()))?;
        *self.describe_calls.lock().entry(job_id.to_string()).or_insert(0) += 1;

        let mut scripts = self.launch_scripts.lock();
        let servers = job
            .server_ids
            .iter()
            .map(|server_id| {
                let state = scripts
                    .entry(server_id.clone())
                    .or_insert_with(|| Script::new(vec![ServerLaunchState::Launched]))
                    .take();
                ServerJobRecord {
                    server_id: server_id.clone(),
                    launch_state: state,
                    instance_id: (state == ServerLaunchState::Launched)
                        .then(|| Self::instance_for(server_id)),
                }
            })
            .collect::<Vec<_>>();

        let status = if servers.iter().all(|s| {
            matches!(
                s.launch_state,
                ServerLaunchState::Launched | ServerLaunchState::Failed
            )
        }) {
            JobStatus::Completed
        } else {
            JobStatus::Started
        };

        Ok(JobDescription {
            job_id: job_id.to_string(),
            status,
            servers,
        })
    }

    async fn describe_instance_validation(
        &self,
        _context: &AccountContext,
        instance_id: &str,
    ) -> Result<InstanceValidationState, RecoveryClientError> {
        let server_id = instance_id
            .strip_prefix("i-")
            .ok_or_else(|| RecoveryClientError::InstanceNotFound(instance_id.to_string()))?;
        let mut scripts = self.validation_scripts.lock();
        Ok(scripts
            .entry(server_id.to_string())
            .or_insert_with(|| Script::new(vec![InstanceValidationState::Completed]))
            .take())
    }

    async fn terminate_instances(
        &self,
        _context: &AccountContext,
        instance_ids: &[String],
    ) -> Result<(), RecoveryClientError> {
        self.terminated.lock().extend(instance_ids.iter().cloned());
        Ok(())
    }
}

/// Fully wired engine over the in-memory store and fake recovery service
pub struct Harness {
    pub store: Arc<InMemoryExecutionStore>,
    pub service: Arc<FakeRecoveryService>,
    pub coordinator: Arc<WaveCoordinator>,
    pub poller: CompletionPoller,
    pub events: Arc<EventPublisher>,
}

pub fn harness(accounts: Vec<AccountProfile>) -> Harness {
    harness_with(accounts, PollerConfig::for_testing())
}

pub fn harness_with(accounts: Vec<AccountProfile>, poller_config: PollerConfig) -> Harness {
    let store = Arc::new(InMemoryExecutionStore::new());
    let service = Arc::new(FakeRecoveryService::new());
    let limiter = Arc::new(RateLimiterRegistry::new(RateLimitConfig {
        refill_rate: 100_000.0,
        capacity: 1_000.0,
        acquire_timeout: Duration::from_millis(250),
    }));
    let client = RecoveryClient::new(
        service.clone(),
        limiter,
        RetryPolicy::new(RetryConfig::for_testing()),
    );
    let events = Arc::new(EventPublisher::new(256));
    let coordinator = Arc::new(WaveCoordinator::new(
        store.clone(),
        client.clone(),
        AccountPartitioner::new(AccountRegistry::new(accounts)),
        events.clone(),
        WaveCoordinatorConfig::default(),
    ));
    let poller = CompletionPoller::new(coordinator.clone(), store.clone(), client, poller_config);

    Harness {
        store,
        service,
        coordinator,
        poller,
        events,
    }
}

pub fn account(id: &str, per_call_limit: usize, capacity_ceiling: usize) -> AccountProfile {
    AccountProfile {
        account_id: id.to_string(),
        region: "us-west-2".to_string(),
        per_call_limit,
        capacity_ceiling,
        capability: CapabilityToken::new(format!("role-{id}")),
    }
}

pub fn wave(number: u32, server_ids: &[&str], depends_on: &[u32]) -> PlanWave {
    PlanWave {
        number,
        name: format!("wave-{number}"),
        depends_on: depends_on.to_vec(),
        pause_before: false,
        server_ids: server_ids.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn pause_wave(number: u32, server_ids: &[&str], depends_on: &[u32]) -> PlanWave {
    PlanWave {
        pause_before: true,
        ..wave(number, server_ids, depends_on)
    }
}

pub fn plan(waves: Vec<PlanWave>) -> RecoveryPlan {
    plan_with_policy(waves, FailurePolicy::Lenient)
}

pub fn plan_with_policy(waves: Vec<PlanWave>, failure_policy: FailurePolicy) -> RecoveryPlan {
    RecoveryPlan {
        id: "plan-1".to_string(),
        name: "integration-plan".to_string(),
        failure_policy,
        waves,
    }
}

/// Drive poller ticks until the execution leaves the awaiting set or the
/// tick budget runs out
pub async fn poll_until_settled(harness: &Harness, ticks: usize) {
    for _ in 0..ticks {
        let summary = harness
            .poller
            .tick()
            .await
            .expect("poll tick should not fail");
        if summary.discovered == 0 {
            return;
        }
    }
}
