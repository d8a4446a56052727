//! Execution, wave, and server-task records
//!
//! An [`Execution`] is the durable record of one recovery-plan run. It is
//! created by the wave coordinator, advanced by the completion poller, and
//! finalized by whichever component observes the completing condition first.
//! Records are externalized state: any process can pick up polling from the
//! execution store alone, with no in-memory continuation.

use super::plan::{ExecutionKind, FailurePolicy, RecoveryPlan};
use crate::state_machine::{ExecutionStatus, LaunchStatus, ValidationStatus, WaveStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Failure reason recorded when an operator cancels the execution
pub const REASON_CANCELLED: &str = "cancelled";
/// Failure reason recorded when no account could accept a server
pub const REASON_NO_CAPACITY: &str = "no_capacity";

/// One server's progress within a wave
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTask {
    pub server_id: String,
    /// Account the server was assigned to, set at launch time
    pub account_id: Option<String>,
    pub region: Option<String>,
    /// External job id covering this server's batch
    pub job_id: Option<String>,
    pub launch_status: LaunchStatus,
    /// Post-launch validation, tracked for recovery kind only
    pub validation_status: Option<ValidationStatus>,
    /// Recovery instance id, captured when the external record reports launch
    pub instance_id: Option<String>,
    pub failure_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub poll_attempts: u32,
}

impl ServerTask {
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            account_id: None,
            region: None,
            job_id: None,
            launch_status: LaunchStatus::Pending,
            validation_status: None,
            instance_id: None,
            failure_reason: None,
            started_at: None,
            last_polled_at: None,
            poll_attempts: 0,
        }
    }

    /// Whether this task no longer blocks wave completion for the given kind.
    ///
    /// Launched tasks in a production recovery additionally need terminal
    /// post-launch validation.
    pub fn is_wave_terminal(&self, kind: ExecutionKind) -> bool {
        if !self.launch_status.is_terminal() {
            return false;
        }
        if self.launch_status == LaunchStatus::Launched && kind.requires_validation() {
            return self
                .validation_status
                .map(|v| v.is_terminal())
                .unwrap_or(false);
        }
        true
    }

    /// Whether this task counts as a failure for the execution outcome
    pub fn is_failed(&self) -> bool {
        matches!(
            self.launch_status,
            LaunchStatus::Failed | LaunchStatus::TimedOut
        ) || self.validation_status == Some(ValidationStatus::Failed)
    }

    /// Mark the task failed with a reason, if not already terminal
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.launch_status.is_terminal() {
            self.launch_status = LaunchStatus::Failed;
            self.failure_reason = Some(reason.into());
        }
    }
}

/// Groups the server tasks of one wave launched together in one external
/// StartJob call against one back-end account.
///
/// One handle, one external job id, one batch within the account's per-call
/// server limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountJobHandle {
    pub job_id: String,
    pub account_id: String,
    pub region: String,
    pub server_ids: Vec<String>,
}

/// An ordered stage within an execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wave {
    pub number: u32,
    pub name: String,
    pub depends_on: Vec<u32>,
    pub pause_before: bool,
    pub status: WaveStatus,
    pub tasks: Vec<ServerTask>,
    pub job_handles: Vec<AccountJobHandle>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_polled_at: Option<DateTime<Utc>>,
}

impl Wave {
    /// Every server task reached a wave-terminal state
    pub fn all_tasks_terminal(&self, kind: ExecutionKind) -> bool {
        self.tasks.iter().all(|t| t.is_wave_terminal(kind))
    }

    /// Any task failed, timed out, or failed validation
    pub fn has_failure(&self) -> bool {
        self.tasks.iter().any(ServerTask::is_failed)
    }

    pub fn task(&self, server_id: &str) -> Option<&ServerTask> {
        self.tasks.iter().find(|t| t.server_id == server_id)
    }

    pub fn task_mut(&mut self, server_id: &str) -> Option<&mut ServerTask> {
        self.tasks.iter_mut().find(|t| t.server_id == server_id)
    }
}

/// One invocation of a recovery plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub execution_id: Uuid,
    pub plan_id: String,
    pub plan_name: String,
    pub kind: ExecutionKind,
    pub failure_policy: FailurePolicy,
    pub status: ExecutionStatus,
    pub waves: Vec<Wave>,
    pub initiator: String,
    /// Wave number the execution is paused before, if paused
    pub paused_wave: Option<u32>,
    /// Opaque resume handle; any process instance can resume from the store
    pub resume_handle: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency token bumped by every conditional store write
    pub version: u64,
}

impl Execution {
    /// Create the initial execution record for a validated plan
    pub fn from_plan(plan: &RecoveryPlan, kind: ExecutionKind, initiator: &str) -> Self {
        let now = Utc::now();
        let waves = plan
            .waves
            .iter()
            .map(|w| Wave {
                number: w.number,
                name: w.name.clone(),
                depends_on: w.depends_on.clone(),
                pause_before: w.pause_before,
                status: WaveStatus::Pending,
                tasks: w.server_ids.iter().map(ServerTask::new).collect(),
                job_handles: Vec::new(),
                started_at: None,
                completed_at: None,
                last_polled_at: None,
            })
            .collect();

        Self {
            execution_id: Uuid::new_v4(),
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            kind,
            failure_policy: plan.failure_policy,
            status: ExecutionStatus::Pending,
            waves,
            initiator: initiator.to_string(),
            paused_wave: None,
            resume_handle: None,
            started_at: now,
            completed_at: None,
            updated_at: now,
            version: 0,
        }
    }

    pub fn wave(&self, number: u32) -> Option<&Wave> {
        self.waves.iter().find(|w| w.number == number)
    }

    pub fn wave_mut(&mut self, number: u32) -> Option<&mut Wave> {
        self.waves.iter_mut().find(|w| w.number == number)
    }

    /// Pending waves whose declared dependencies are all completed,
    /// in wave-number order
    pub fn ready_waves(&self) -> Vec<u32> {
        let mut ready: Vec<u32> = self
            .waves
            .iter()
            .filter(|w| w.status == WaveStatus::Pending)
            .filter(|w| {
                w.depends_on.iter().all(|dep| {
                    self.wave(*dep)
                        .map(|d| d.status.satisfies_dependencies())
                        .unwrap_or(false)
                })
            })
            .map(|w| w.number)
            .collect();
        ready.sort_unstable();
        ready
    }

    pub fn all_waves_terminal(&self) -> bool {
        self.waves.iter().all(|w| w.status.is_terminal())
    }

    pub fn has_failed_tasks(&self) -> bool {
        self.waves.iter().any(Wave::has_failure)
    }

    /// In-flight server count per assigned account, for capacity accounting
    pub fn in_flight_by_account(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for wave in &self.waves {
            for task in &wave.tasks {
                if task.launch_status.is_in_flight() {
                    if let Some(account) = &task.account_id {
                        *counts.entry(account.clone()).or_insert(0) += 1;
                    }
                }
            }
        }
        counts
    }

    /// Launched instance ids grouped by account, for explicit cleanup
    pub fn instances_by_account(&self) -> HashMap<String, Vec<String>> {
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        for wave in &self.waves {
            for task in &wave.tasks {
                if let (Some(account), Some(instance)) = (&task.account_id, &task.instance_id) {
                    grouped
                        .entry(account.clone())
                        .or_default()
                        .push(instance.clone());
                }
            }
        }
        grouped
    }
}
