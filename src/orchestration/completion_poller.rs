//! # Completion Poller
//!
//! Periodic reconciliation loop between stored executions and the external
//! recovery service. Each tick discovers awaiting executions through the
//! store index, describes their in-flight jobs, folds the reported state
//! into the execution record, and hands fully-terminal waves back to the
//! wave coordinator.
//!
//! ## Key Behaviors
//!
//! - **Per-execution isolation**: one execution's poll error is logged and
//!   skipped; the tick keeps going
//! - **Authoritative reconciliation**: the external description is truth,
//!   including backwards-looking states (a task marked launched locally is
//!   reverted if the service reports it in progress)
//! - **Adaptive cadence**: young waves get a short advisory interval,
//!   long-running ones back off; a wave polled within its interval is
//!   skipped for the tick
//! - **Task timeout**: after the per-task ceiling, exactly one fresh
//!   authoritative re-query decides between late success and `TimedOut`
//!
//! Writes go through the store's conditional update; a version conflict
//! means an operator action (usually cancel) won the race, and the poll
//! result is discarded rather than merged.

use crate::client::{
    InstanceValidationState, JobDescription, RecoveryClient, ServerLaunchState,
};
use crate::models::{Execution, ExecutionKind, Wave};
use crate::orchestration::errors::{OrchestrationError, OrchestrationResult};
use crate::orchestration::wave_coordinator::WaveCoordinator;
use crate::state_machine::{LaunchStatus, ValidationStatus, WaveStatus};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for completion polling cadence and limits
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Page size for awaiting-index scans
    pub page_size: usize,
    /// Executions polled concurrently within one tick
    pub max_concurrency: usize,
    /// Ceiling on a single server task before the timeout re-query
    pub task_timeout: Duration,
    /// Advisory interval while a wave is younger than `early_phase`
    pub fast_interval: Duration,
    /// Advisory interval between the early and late phase boundaries
    pub standard_interval: Duration,
    /// Advisory interval once a wave is older than `late_phase`
    pub slow_interval: Duration,
    pub early_phase: Duration,
    pub late_phase: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_concurrency: 8,
            task_timeout: Duration::from_secs(30 * 60),
            fast_interval: Duration::from_secs(15),
            standard_interval: Duration::from_secs(30),
            slow_interval: Duration::from_secs(60),
            early_phase: Duration::from_secs(2 * 60),
            late_phase: Duration::from_secs(20 * 60),
        }
    }
}

impl PollerConfig {
    /// Advisory delay before the next poll of a wave that launched at
    /// `started_at`: young waves change fast, old ones rarely do.
    pub fn advisory_interval(&self, started_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        let age = (now - started_at).to_std().unwrap_or(Duration::ZERO);
        if age < self.early_phase {
            self.fast_interval
        } else if age < self.late_phase {
            self.standard_interval
        } else {
            self.slow_interval
        }
    }

    /// Whether a wave's advisory interval has elapsed since its last poll.
    /// Never-polled waves are always due.
    fn wave_due(&self, wave: &Wave, now: DateTime<Utc>) -> bool {
        let Some(last) = wave.last_polled_at else {
            return true;
        };
        let interval = self.advisory_interval(wave.started_at.unwrap_or(now), now);
        match ChronoDuration::from_std(interval) {
            Ok(interval) => now - last >= interval,
            Err(_) => true,
        }
    }

    /// Tight timings for integration tests. Advisory intervals are zero so
    /// back-to-back ticks are never gated.
    pub fn for_testing() -> Self {
        Self {
            page_size: 10,
            max_concurrency: 2,
            task_timeout: Duration::from_millis(50),
            fast_interval: Duration::ZERO,
            standard_interval: Duration::ZERO,
            slow_interval: Duration::ZERO,
            early_phase: Duration::from_millis(10),
            late_phase: Duration::from_millis(20),
        }
    }
}

/// Outcome of one poller tick
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollSummary {
    /// Executions discovered through the awaiting index
    pub discovered: usize,
    /// Executions whose records changed this tick
    pub reconciled: usize,
    /// Executions skipped after a poll error
    pub errored: usize,
    /// Poll results discarded after losing a conditional write
    pub discarded: usize,
}

/// Reconciles awaiting executions against the external recovery service
pub struct CompletionPoller {
    coordinator: Arc<WaveCoordinator>,
    store: Arc<dyn crate::store::ExecutionStore>,
    client: RecoveryClient,
    config: PollerConfig,
}

impl CompletionPoller {
    pub fn new(
        coordinator: Arc<WaveCoordinator>,
        store: Arc<dyn crate::store::ExecutionStore>,
        client: RecoveryClient,
        config: PollerConfig,
    ) -> Self {
        Self {
            coordinator,
            store,
            client,
            config,
        }
    }

    /// One full reconciliation pass over every awaiting execution.
    ///
    /// Safe to run from overlapping schedules: an execution already
    /// reconciled to a terminal state leaves the awaiting index, so a repeat
    /// tick finds nothing to do.
    pub async fn tick(&self) -> OrchestrationResult<PollSummary> {
        let mut execution_ids = Vec::new();
        let mut page = 0usize;
        loop {
            let ids = self.store.list_awaiting(page, self.config.page_size).await?;
            let short_page = ids.len() < self.config.page_size;
            execution_ids.extend(ids);
            if short_page {
                break;
            }
            page += 1;
        }

        let mut summary = PollSummary {
            discovered: execution_ids.len(),
            ..Default::default()
        };
        if execution_ids.is_empty() {
            return Ok(summary);
        }
        debug!(discovered = summary.discovered, "poll tick starting");

        let mut in_flight = FuturesUnordered::new();
        let mut pending = execution_ids.into_iter();
        for id in pending.by_ref().take(self.config.max_concurrency) {
            in_flight.push(self.poll_execution_guarded(id));
        }
        while let Some(outcome) = in_flight.next().await {
            match outcome {
                PollOutcome::Reconciled => summary.reconciled += 1,
                PollOutcome::Unchanged => {}
                PollOutcome::Discarded => summary.discarded += 1,
                PollOutcome::Errored => summary.errored += 1,
            }
            if let Some(id) = pending.next() {
                in_flight.push(self.poll_execution_guarded(id));
            }
        }

        info!(
            discovered = summary.discovered,
            reconciled = summary.reconciled,
            errored = summary.errored,
            discarded = summary.discarded,
            "🔄 poll tick complete"
        );
        Ok(summary)
    }

    async fn poll_execution_guarded(&self, execution_id: Uuid) -> PollOutcome {
        match self.poll_execution(execution_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // One execution's failure never stops the tick.
                warn!(execution_id = %execution_id, error = %e, "poll failed");
                PollOutcome::Errored
            }
        }
    }

    /// Reconcile one execution: describe its in-flight jobs, fold the
    /// results into the record, persist, then advance any finished waves.
    pub async fn poll_execution(&self, execution_id: Uuid) -> OrchestrationResult<PollOutcome> {
        let Some(mut execution) = self.store.get(execution_id).await? else {
            return Err(OrchestrationError::ExecutionNotFound(execution_id));
        };
        if !execution.status.is_awaiting() {
            return Ok(PollOutcome::Unchanged);
        }

        let kind = execution.kind;
        let now = Utc::now();
        // Descriptions fetched this tick, reused by the timeout path so a
        // timed-out task costs at most one authoritative query.
        let mut described: HashMap<String, JobDescription> = HashMap::new();
        let mut changed = false;

        let wave_numbers: Vec<u32> = execution
            .waves
            .iter()
            .filter(|w| w.status == WaveStatus::Polling)
            .map(|w| w.number)
            .collect();

        for wave_number in &wave_numbers {
            // Advisory pacing: a wave polled within its interval is left
            // alone this tick. The interval scales with the wave's age.
            let due = execution
                .wave(*wave_number)
                .is_some_and(|w| self.config.wave_due(w, now));
            if !due {
                continue;
            }
            self.reconcile_wave(&mut execution, *wave_number, kind, now, &mut described)
                .await?;
            changed = true;
        }

        if changed {
            match self.store.update(execution).await {
                Ok(_) => {}
                Err(crate::store::StoreError::VersionConflict { .. }) => {
                    // An operator write (cancel wins) landed mid-poll.
                    info!(execution_id = %execution_id, "poll result discarded after version conflict");
                    return Ok(PollOutcome::Discarded);
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Wave advancement re-loads the record, so it always sees the write
        // above rather than this tick's local copy.
        for wave_number in wave_numbers {
            let Some(current) = self.store.get(execution_id).await? else {
                break;
            };
            if current.status.is_terminal() {
                break;
            }
            let done = current
                .wave(wave_number)
                .is_some_and(|w| w.status == WaveStatus::Polling && w.all_tasks_terminal(kind));
            if done {
                self.coordinator.advance_wave(execution_id, wave_number).await?;
            }
        }

        Ok(if changed {
            PollOutcome::Reconciled
        } else {
            PollOutcome::Unchanged
        })
    }

    /// Fold the external state of one polling wave into the record and
    /// stamp the wave's last-polled time for the advisory gate.
    async fn reconcile_wave(
        &self,
        execution: &mut Execution,
        wave_number: u32,
        kind: ExecutionKind,
        now: DateTime<Utc>,
        described: &mut HashMap<String, JobDescription>,
    ) -> OrchestrationResult<()> {
        let execution_id = execution.execution_id;
        let Some(wave) = execution.wave_mut(wave_number) else {
            return Ok(());
        };

        let handles = wave.job_handles.clone();
        for handle in &handles {
            let needs_poll = handle.server_ids.iter().any(|sid| {
                wave.task(sid)
                    .is_some_and(|t| !t.is_wave_terminal(kind) && t.launch_status.is_in_flight())
            });
            let needs_validation = kind.requires_validation()
                && handle.server_ids.iter().any(|sid| {
                    wave.task(sid).is_some_and(|t| {
                        t.launch_status == LaunchStatus::Launched
                            && !t
                                .validation_status
                                .is_some_and(|v| v.is_terminal())
                    })
                });
            if !needs_poll && !needs_validation {
                continue;
            }

            if needs_poll {
                let Some(context) = self
                    .coordinator
                    .partitioner()
                    .registry()
                    .context_for(&handle.account_id)
                else {
                    warn!(
                        execution_id = %execution_id,
                        account_id = %handle.account_id,
                        "account missing from registry, skipping job poll"
                    );
                    continue;
                };

                match self.client.describe_job(&context, &handle.job_id).await {
                    Ok(description) => {
                        described.insert(handle.job_id.clone(), description.clone());
                        apply_description(wave, handle.server_ids.as_slice(), &description);
                    }
                    Err(e) => {
                        // Transient exhaustion leaves statuses untouched; the
                        // attempt count still moves so a stuck job is visible.
                        warn!(
                            execution_id = %execution_id,
                            job_id = %handle.job_id,
                            error = %e,
                            "job description failed, keeping local state"
                        );
                        for server_id in &handle.server_ids {
                            if let Some(task) = wave.task_mut(server_id) {
                                if !task.launch_status.is_terminal() {
                                    task.poll_attempts += 1;
                                    task.last_polled_at = Some(now);
                                }
                            }
                        }
                    }
                }
            }

            // Recovery executions gate wave completion on per-instance
            // validation; drills skip it entirely.
            if kind.requires_validation() {
                self.reconcile_validation(wave, handle.server_ids.as_slice(), &handle.account_id)
                    .await?;
            }

            // Timeout ceiling: one fresh authoritative answer decides.
            self.apply_timeouts(wave, handle.server_ids.as_slice(), &handle.job_id, &handle.account_id, now, described)
                .await?;
        }

        wave.last_polled_at = Some(now);
        Ok(())
    }

    async fn reconcile_validation(
        &self,
        wave: &mut Wave,
        server_ids: &[String],
        account_id: &str,
    ) -> OrchestrationResult<()> {
        let Some(context) = self.coordinator.partitioner().registry().context_for(account_id)
        else {
            return Ok(());
        };

        for server_id in server_ids {
            let Some((instance_id, current)) = wave.task(server_id).and_then(|t| {
                if t.launch_status != LaunchStatus::Launched {
                    return None;
                }
                if t.validation_status.is_some_and(|v| v.is_terminal()) {
                    return None;
                }
                t.instance_id.clone().map(|i| (i, t.validation_status))
            }) else {
                continue;
            };

            let state = match self
                .client
                .describe_instance_validation(&context, &instance_id)
                .await
            {
                Ok(s) => s,
                Err(e) => {
                    warn!(instance_id = %instance_id, error = %e, "validation description failed");
                    continue;
                }
            };
            let next = match state {
                InstanceValidationState::Pending => ValidationStatus::Pending,
                InstanceValidationState::InProgress => ValidationStatus::InProgress,
                InstanceValidationState::Completed => ValidationStatus::Completed,
                InstanceValidationState::Failed => ValidationStatus::Failed,
            };
            if current != Some(next) {
                if let Some(task) = wave.task_mut(server_id) {
                    task.validation_status = Some(next);
                    if next == ValidationStatus::Failed {
                        task.failure_reason = Some("instance validation failed".to_string());
                    }
                }
            }
        }
        Ok(())
    }

    /// Tasks past the per-task ceiling get exactly one more authoritative
    /// look: a description fetched this tick counts, otherwise one fresh
    /// query is issued. Still not launched afterwards means `TimedOut`.
    /// Without an authoritative answer the local clock alone never times a
    /// task out; the re-query is retried on the next tick.
    async fn apply_timeouts(
        &self,
        wave: &mut Wave,
        server_ids: &[String],
        job_id: &str,
        account_id: &str,
        now: DateTime<Utc>,
        described: &mut HashMap<String, JobDescription>,
    ) -> OrchestrationResult<()> {
        let ceiling = ChronoDuration::from_std(self.config.task_timeout)
            .unwrap_or_else(|_| ChronoDuration::seconds(30 * 60));
        let expired: Vec<String> = server_ids
            .iter()
            .filter(|sid| {
                wave.task(sid).is_some_and(|t| {
                    t.launch_status.is_in_flight()
                        && t.started_at.is_some_and(|s| now - s >= ceiling)
                })
            })
            .cloned()
            .collect();
        if expired.is_empty() {
            return Ok(());
        }

        if !described.contains_key(job_id) {
            let Some(context) = self
                .coordinator
                .partitioner()
                .registry()
                .context_for(account_id)
            else {
                return Ok(());
            };
            match self.client.describe_job(&context, job_id).await {
                Ok(d) => {
                    described.insert(job_id.to_string(), d);
                }
                Err(e) => {
                    warn!(
                        job_id = %job_id,
                        error = %e,
                        "timeout re-query failed, keeping local state"
                    );
                    return Ok(());
                }
            }
        }

        if let Some(description) = described.get(job_id) {
            apply_description(wave, &expired, description);
        }
        for server_id in &expired {
            if let Some(task) = wave.task_mut(server_id) {
                if task.launch_status.is_in_flight() {
                    task.launch_status = LaunchStatus::TimedOut;
                    task.failure_reason = Some(format!(
                        "no terminal state after {}s",
                        self.config.task_timeout.as_secs()
                    ));
                    warn!(
                        server_id = %server_id,
                        job_id = %job_id,
                        "⏰ server task timed out"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Fold one job description into the wave's tasks. The external record is
/// authoritative in both directions.
fn apply_description(wave: &mut Wave, server_ids: &[String], description: &JobDescription) {
    for server_id in server_ids {
        let Some(record) = description.servers.iter().find(|s| &s.server_id == server_id)
        else {
            continue;
        };
        let Some(task) = wave.task_mut(server_id) else {
            continue;
        };

        let next = match record.launch_state {
            ServerLaunchState::Pending => LaunchStatus::Pending,
            ServerLaunchState::InProgress => LaunchStatus::InProgress,
            ServerLaunchState::Launched => LaunchStatus::Launched,
            ServerLaunchState::Failed => LaunchStatus::Failed,
        };
        if task.launch_status != next {
            task.launch_status = next;
            if next == LaunchStatus::Failed && task.failure_reason.is_none() {
                task.failure_reason = Some("launch failed".to_string());
            }
        }
        task.instance_id = record.instance_id.clone();
        if !task.launch_status.is_terminal() {
            task.poll_attempts += 1;
            task.last_polled_at = Some(Utc::now());
        }
    }
}

/// Per-execution result within a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// External state folded in and persisted
    Reconciled,
    /// Nothing new from the service
    Unchanged,
    /// Conditional write lost; result dropped
    Discarded,
    /// Poll error; execution skipped this tick
    Errored,
}
