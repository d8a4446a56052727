//! # Wave Coordinator
//!
//! Drives one execution through its waves in dependency order. The launch
//! path is short and synchronous per call: it batches servers through the
//! account partitioner, starts one recovery job per batch, records the job
//! handles, and returns without blocking — completion detection belongs to
//! the completion poller, which re-enters the coordinator through
//! [`WaveCoordinator::advance_wave`].
//!
//! ## Key Responsibilities
//!
//! - **Plan intake**: validate the wave graph and create the execution record
//! - **Wave launch**: partition, start jobs, record account job handles
//! - **Dependency gating**: a wave never launches before its dependencies
//!   complete; enforced here, never by the poller
//! - **Pause points**: transition to `Paused` before flagged waves, resume
//!   on operator request
//! - **Finalization**: completed / partial / failed / cancelled outcomes
//!
//! Partial batch failure is a first-class outcome: one account's launch
//! error fails that batch's tasks and the remaining batches proceed.

use crate::events::{ExecutionEvent, ExecutionEventType, Notifier};
use crate::models::{
    AccountJobHandle, Execution, ExecutionKind, RecoveryPlan, REASON_CANCELLED, REASON_NO_CAPACITY,
};
use crate::orchestration::errors::{OrchestrationError, OrchestrationResult};
use crate::orchestration::partitioner::AccountPartitioner;
use crate::client::RecoveryClient;
use crate::state_machine::{next_status, ExecutionEvent as Transition, ExecutionStatus, LaunchStatus, WaveStatus};
use crate::store::{ExecutionStore, StoreError};
use crate::validation::validate_plan;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Bounded retries for operator writes that race the poller
const CONDITIONAL_WRITE_ATTEMPTS: u32 = 3;

/// Configuration for wave coordination
#[derive(Debug, Clone)]
pub struct WaveCoordinatorConfig {
    /// Page size used when scanning the awaiting index for capacity accounting
    pub awaiting_page_size: usize,
}

impl Default for WaveCoordinatorConfig {
    fn default() -> Self {
        Self {
            awaiting_page_size: 100,
        }
    }
}

/// Central orchestration engine for execution lifecycles
pub struct WaveCoordinator {
    store: Arc<dyn ExecutionStore>,
    client: RecoveryClient,
    partitioner: AccountPartitioner,
    notifier: Arc<dyn Notifier>,
    config: WaveCoordinatorConfig,
}

impl WaveCoordinator {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        client: RecoveryClient,
        partitioner: AccountPartitioner,
        notifier: Arc<dyn Notifier>,
        config: WaveCoordinatorConfig,
    ) -> Self {
        Self {
            store,
            client,
            partitioner,
            notifier,
            config,
        }
    }

    pub fn partitioner(&self) -> &AccountPartitioner {
        &self.partitioner
    }

    /// Validate a plan, create the execution record, and launch every wave
    /// with no unmet dependencies. Returns the new execution id.
    ///
    /// A plan with a cyclic or dangling dependency graph is rejected before
    /// any record is created.
    pub async fn start_execution(
        &self,
        plan: &RecoveryPlan,
        kind: ExecutionKind,
        initiator: &str,
    ) -> OrchestrationResult<Uuid> {
        validate_plan(plan)?;

        let execution = Execution::from_plan(plan, kind, initiator);
        let execution_id = execution.execution_id;
        self.store.create(execution.clone()).await?;

        info!(
            execution_id = %execution_id,
            plan_id = %plan.id,
            kind = %kind,
            waves = plan.waves.len(),
            servers = plan.server_count(),
            "🌊 execution started"
        );
        self.notify(
            execution_id,
            ExecutionEventType::ExecutionStarted,
            json!({ "plan_id": plan.id, "kind": kind, "initiator": initiator }),
        )
        .await;

        self.launch_ready_waves(execution).await?;
        Ok(execution_id)
    }

    /// Launch one wave by number. Public for API parity; `start_execution`,
    /// `advance_wave`, and `resume` drive it internally.
    pub async fn launch_wave(
        &self,
        execution_id: Uuid,
        wave_number: u32,
    ) -> OrchestrationResult<()> {
        let execution = self.load(execution_id).await?;
        self.launch_wave_impl(execution, wave_number).await?;
        Ok(())
    }

    /// Invoked by the poller once every task in the wave is terminal.
    ///
    /// Applies the failure policy, completes the wave, and either launches
    /// newly-unblocked waves, pauses at a flagged wave, or finalizes the
    /// execution when no waves remain.
    pub async fn advance_wave(
        &self,
        execution_id: Uuid,
        wave_number: u32,
    ) -> OrchestrationResult<()> {
        let mut execution = self.load(execution_id).await?;

        // Results arriving for an already-cancelled (or otherwise settled)
        // execution are discarded rather than applied.
        if execution.status.is_terminal() || execution.status == ExecutionStatus::Paused {
            return Ok(());
        }

        let kind = execution.kind;
        let wave = execution
            .wave(wave_number)
            .ok_or(OrchestrationError::WaveNotFound {
                execution_id,
                wave: wave_number,
            })?;
        if wave.status.is_terminal() || !wave.all_tasks_terminal(kind) {
            return Ok(());
        }

        let wave_failed = wave.has_failure();
        if wave_failed && execution.failure_policy == crate::models::FailurePolicy::Strict {
            return self.fail_execution(execution, wave_number).await;
        }

        if let Some(wave) = execution.wave_mut(wave_number) {
            wave.status = WaveStatus::Completed;
            wave.completed_at = Some(Utc::now());
        }
        let execution = self.store.update(execution).await?;
        info!(
            execution_id = %execution_id,
            wave = wave_number,
            with_failures = wave_failed,
            "🌊 wave completed"
        );
        self.notify(
            execution_id,
            ExecutionEventType::WaveCompleted,
            json!({ "wave": wave_number, "with_failures": wave_failed }),
        )
        .await;

        let execution = self.launch_ready_waves(execution).await?;
        if execution.all_waves_terminal()
            && !execution.status.is_terminal()
            && execution.status != ExecutionStatus::Paused
        {
            self.finalize(execution).await?;
        }
        Ok(())
    }

    /// Resume a paused execution: clears the pause marker and launches the
    /// waiting wave. Valid only in `Paused`.
    pub async fn resume(&self, execution_id: Uuid) -> OrchestrationResult<()> {
        let mut execution = self.load(execution_id).await?;
        if execution.status != ExecutionStatus::Paused {
            return Err(OrchestrationError::NotPaused {
                execution_id,
                status: execution.status,
            });
        }
        let wave_number = execution
            .paused_wave
            .ok_or(OrchestrationError::InvalidState {
                execution_id,
                status: execution.status,
            })?;

        execution.status = next_status(execution.status, &Transition::Resume)?;
        execution.paused_wave = None;
        execution.resume_handle = None;
        let execution = self.store.update(execution).await?;

        info!(execution_id = %execution_id, wave = wave_number, "▶️ execution resumed");
        self.notify(
            execution_id,
            ExecutionEventType::ExecutionResumed,
            json!({ "wave": wave_number }),
        )
        .await;

        // Launch the waiting wave directly: its pause point was consumed.
        let execution = self.launch_wave_impl(execution, wave_number).await?;
        self.launch_ready_waves(execution).await?;
        Ok(())
    }

    /// Cancel a non-terminal execution. Non-terminal server tasks are failed
    /// with reason `cancelled`; already-launched instances are untouched —
    /// cleanup is [`WaveCoordinator::terminate_recovered_instances`].
    pub async fn cancel(&self, execution_id: Uuid) -> OrchestrationResult<()> {
        for _ in 0..CONDITIONAL_WRITE_ATTEMPTS {
            let mut execution = self.load(execution_id).await?;
            if execution.status.is_terminal() {
                return Err(OrchestrationError::InvalidState {
                    execution_id,
                    status: execution.status,
                });
            }

            for wave in &mut execution.waves {
                if !wave.status.is_terminal() {
                    wave.status = WaveStatus::Cancelled;
                    wave.completed_at = Some(Utc::now());
                    for task in &mut wave.tasks {
                        task.fail(REASON_CANCELLED);
                    }
                }
            }
            execution.status = next_status(execution.status, &Transition::Cancel)?;
            execution.paused_wave = None;
            execution.resume_handle = None;
            execution.completed_at = Some(Utc::now());

            match self.store.update(execution).await {
                Ok(_) => {
                    info!(execution_id = %execution_id, "🛑 execution cancelled");
                    self.notify(
                        execution_id,
                        ExecutionEventType::ExecutionCancelled,
                        json!({}),
                    )
                    .await;
                    return Ok(());
                }
                // A poller write landed between load and update; retry
                // against the fresh record.
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrchestrationError::Store(StoreError::Backend(format!(
            "cancel of {execution_id} kept losing conditional writes"
        ))))
    }

    /// Explicit cleanup: terminate every instance this execution launched.
    /// Best-effort per account; returns the number of instances terminated.
    pub async fn terminate_recovered_instances(
        &self,
        execution_id: Uuid,
    ) -> OrchestrationResult<usize> {
        let execution = self.load(execution_id).await?;
        let mut terminated = 0usize;

        for (account_id, instance_ids) in execution.instances_by_account() {
            let Some(context) = self.partitioner.registry().context_for(&account_id) else {
                warn!(
                    execution_id = %execution_id,
                    account_id = %account_id,
                    "account missing from registry, skipping instance cleanup"
                );
                continue;
            };
            match self.client.terminate_instances(&context, &instance_ids).await {
                Ok(()) => terminated += instance_ids.len(),
                Err(e) => error!(
                    execution_id = %execution_id,
                    account_id = %account_id,
                    error = %e,
                    "instance termination failed"
                ),
            }
        }

        self.notify(
            execution_id,
            ExecutionEventType::InstancesTerminated,
            json!({ "terminated": terminated }),
        )
        .await;
        Ok(terminated)
    }

    /// Latest reconciled execution snapshot
    pub async fn status(&self, execution_id: Uuid) -> OrchestrationResult<Execution> {
        self.load(execution_id).await
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    async fn load(&self, execution_id: Uuid) -> OrchestrationResult<Execution> {
        self.store
            .get(execution_id)
            .await?
            .ok_or(OrchestrationError::ExecutionNotFound(execution_id))
    }

    async fn notify(&self, execution_id: Uuid, event_type: ExecutionEventType, detail: serde_json::Value) {
        self.notifier
            .notify(ExecutionEvent::new(execution_id, event_type, detail))
            .await;
    }

    /// Launch every pending wave whose dependencies are satisfied, stopping
    /// at the first pause-flagged wave. The pause takes effect only once no
    /// other wave is in flight; until then the flagged wave stays pending
    /// and is revisited at the next advance.
    async fn launch_ready_waves(
        &self,
        mut execution: Execution,
    ) -> OrchestrationResult<Execution> {
        let mut launched_any = false;
        for wave_number in execution.ready_waves() {
            let pause_before = execution
                .wave(wave_number)
                .is_some_and(|w| w.pause_before);
            if pause_before {
                let any_in_flight = execution.waves.iter().any(|w| {
                    matches!(w.status, WaveStatus::Launching | WaveStatus::Polling)
                });
                if launched_any || any_in_flight {
                    break;
                }

                execution.status = next_status(execution.status, &Transition::Pause)?;
                execution.paused_wave = Some(wave_number);
                execution.resume_handle = Some(Uuid::new_v4());
                let execution = self.store.update(execution).await?;

                info!(
                    execution_id = %execution.execution_id,
                    wave = wave_number,
                    "⏸️ execution paused before wave"
                );
                self.notify(
                    execution.execution_id,
                    ExecutionEventType::ExecutionPaused,
                    json!({ "wave": wave_number }),
                )
                .await;
                return Ok(execution);
            }

            execution = self.launch_wave_impl(execution, wave_number).await?;
            launched_any = true;
        }
        Ok(execution)
    }

    /// Partition one wave's servers, start one job per batch, and record the
    /// account job handles. Never blocks on job completion.
    async fn launch_wave_impl(
        &self,
        mut execution: Execution,
        wave_number: u32,
    ) -> OrchestrationResult<Execution> {
        let execution_id = execution.execution_id;
        let kind = execution.kind;
        let server_ids: Vec<String> = match execution.wave(wave_number) {
            Some(wave) => wave.tasks.iter().map(|t| t.server_id.clone()).collect(),
            None => {
                return Err(OrchestrationError::WaveNotFound {
                    execution_id,
                    wave: wave_number,
                })
            }
        };

        if execution.status != ExecutionStatus::Launching {
            execution.status = next_status(execution.status, &Transition::BeginLaunch)?;
        }
        if let Some(wave) = execution.wave_mut(wave_number) {
            wave.status = WaveStatus::Launching;
            wave.started_at = Some(Utc::now());
        }
        let mut execution = self.store.update(execution).await?;

        // Capacity accounting across all awaiting executions, so a single
        // logical execution never overcommits a constrained account.
        let in_flight = self.account_in_flight().await?;
        let outcome = self.partitioner.partition(&server_ids, &in_flight);

        let mut failed_batches = 0usize;
        let mut handles: Vec<AccountJobHandle> = Vec::new();
        let mut launched: HashMap<String, (String, String, String)> = HashMap::new();

        for batch in &outcome.batches {
            match self
                .client
                .start_job(&batch.context, &batch.server_ids, kind.is_drill())
                .await
            {
                Ok(job_id) => {
                    for server_id in &batch.server_ids {
                        launched.insert(
                            server_id.clone(),
                            (
                                job_id.clone(),
                                batch.context.account_id.clone(),
                                batch.context.region.clone(),
                            ),
                        );
                    }
                    handles.push(AccountJobHandle {
                        job_id,
                        account_id: batch.context.account_id.clone(),
                        region: batch.context.region.clone(),
                        server_ids: batch.server_ids.clone(),
                    });
                }
                Err(e) => {
                    // Partial batch failure is a first-class outcome: this
                    // batch fails, remaining batches still launch.
                    failed_batches += 1;
                    warn!(
                        execution_id = %execution_id,
                        wave = wave_number,
                        account_id = %batch.context.account_id,
                        error = %e,
                        "batch launch failed"
                    );
                    let reason = e.to_string();
                    if let Some(wave) = execution.wave_mut(wave_number) {
                        for server_id in &batch.server_ids {
                            if let Some(task) = wave.task_mut(server_id) {
                                task.fail(&reason);
                            }
                        }
                    }
                }
            }
        }

        if let Some(wave) = execution.wave_mut(wave_number) {
            let now = Utc::now();
            for server_id in &outcome.unplaced {
                if let Some(task) = wave.task_mut(server_id) {
                    task.fail(REASON_NO_CAPACITY);
                }
            }
            for (server_id, (job_id, account_id, region)) in &launched {
                if let Some(task) = wave.task_mut(server_id) {
                    task.job_id = Some(job_id.clone());
                    task.account_id = Some(account_id.clone());
                    task.region = Some(region.clone());
                    task.launch_status = LaunchStatus::InProgress;
                    task.started_at = Some(now);
                }
            }
            wave.job_handles.extend(handles);
            wave.status = WaveStatus::Polling;
        }
        execution.status = next_status(execution.status, &Transition::BeginPolling)?;
        let execution = self.store.update(execution).await?;

        info!(
            execution_id = %execution_id,
            wave = wave_number,
            batches = outcome.batches.len(),
            failed_batches,
            unplaced = outcome.unplaced.len(),
            "🚀 wave launched"
        );
        self.notify(
            execution_id,
            ExecutionEventType::WaveLaunched,
            json!({
                "wave": wave_number,
                "batches": outcome.batches.len(),
                "failed_batches": failed_batches,
                "unplaced": outcome.unplaced.len(),
            }),
        )
        .await;

        Ok(execution)
    }

    /// Strict-policy wave failure: fail the execution and cancel the waves
    /// that will now never launch.
    async fn fail_execution(
        &self,
        mut execution: Execution,
        wave_number: u32,
    ) -> OrchestrationResult<()> {
        let execution_id = execution.execution_id;
        let reason = execution
            .wave(wave_number)
            .and_then(|w| {
                w.tasks
                    .iter()
                    .find(|t| t.is_failed())
                    .and_then(|t| t.failure_reason.clone())
            })
            .unwrap_or_else(|| "server task failed".to_string());

        if let Some(wave) = execution.wave_mut(wave_number) {
            wave.status = WaveStatus::Failed;
            wave.completed_at = Some(Utc::now());
        }
        for wave in &mut execution.waves {
            if !wave.status.is_terminal() {
                wave.status = WaveStatus::Cancelled;
                wave.completed_at = Some(Utc::now());
            }
        }
        execution.status = next_status(execution.status, &Transition::Fail(reason.clone()))?;
        execution.completed_at = Some(Utc::now());
        self.store.update(execution).await?;

        error!(
            execution_id = %execution_id,
            wave = wave_number,
            reason = %reason,
            "❌ execution failed under strict policy"
        );
        self.notify(
            execution_id,
            ExecutionEventType::ExecutionFailed,
            json!({ "wave": wave_number, "reason": reason }),
        )
        .await;
        Ok(())
    }

    /// Terminal bookkeeping once the last wave is terminal: `Completed` with
    /// no failed tasks, `Partial` otherwise (lenient policy).
    async fn finalize(&self, mut execution: Execution) -> OrchestrationResult<()> {
        let execution_id = execution.execution_id;
        let (transition, event_type) = if execution.has_failed_tasks() {
            (
                Transition::CompletePartial,
                ExecutionEventType::ExecutionPartial,
            )
        } else {
            (Transition::Complete, ExecutionEventType::ExecutionCompleted)
        };

        execution.status = next_status(execution.status, &transition)?;
        execution.completed_at = Some(Utc::now());
        let status = execution.status;
        self.store.update(execution).await?;

        info!(execution_id = %execution_id, status = %status, "🏁 execution finalized");
        self.notify(execution_id, event_type, json!({ "status": status }))
            .await;
        Ok(())
    }

    /// Non-terminal server count per account across every awaiting
    /// execution, via the store's awaiting index.
    async fn account_in_flight(&self) -> OrchestrationResult<HashMap<String, usize>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut page = 0usize;
        loop {
            let ids = self
                .store
                .list_awaiting(page, self.config.awaiting_page_size)
                .await?;
            let short_page = ids.len() < self.config.awaiting_page_size;
            for id in ids {
                if let Some(execution) = self.store.get(id).await? {
                    for (account, count) in execution.in_flight_by_account() {
                        *counts.entry(account).or_insert(0) += count;
                    }
                }
            }
            if short_page {
                break;
            }
            page += 1;
        }
        Ok(counts)
    }
}
