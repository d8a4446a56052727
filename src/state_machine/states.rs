use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution-level status for a recovery plan run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Initial state when the execution record is created
    Pending,
    /// At least one wave is being launched against the recovery service
    Launching,
    /// Launched jobs are being polled for completion
    Polling,
    /// Execution is waiting at a manual pause point
    Paused,
    /// Every wave completed with no failed server tasks
    Completed,
    /// Execution finished but at least one server task failed (lenient policy)
    Partial,
    /// Execution failed (strict policy, or unrecoverable launch failure)
    Failed,
    /// Execution was cancelled by an operator
    Cancelled,
}

impl ExecutionStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Partial | Self::Failed | Self::Cancelled
        )
    }

    /// Check if the execution should be picked up by the completion poller
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::Launching | Self::Polling)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Launching => write!(f, "launching"),
            Self::Polling => write!(f, "polling"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "launching" => Ok(Self::Launching),
            "polling" => Ok(Self::Polling),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid execution status: {s}")),
        }
    }
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Wave-level status within an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveStatus {
    /// Waiting on dependencies or a pause point
    Pending,
    /// Launch calls against the recovery service are in flight
    Launching,
    /// Jobs launched, waiting on per-server completion
    Polling,
    /// Every server task reached a terminal state
    Completed,
    /// Wave failed under the strict failure policy
    Failed,
    /// Execution was cancelled while this wave was non-terminal
    Cancelled,
}

impl WaveStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if this wave satisfies dependencies for downstream waves
    pub fn satisfies_dependencies(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for WaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Launching => write!(f, "launching"),
            Self::Polling => write!(f, "polling"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl Default for WaveStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Per-server launch status within a wave
///
/// Advances forward only, except via authoritative reconciliation against the
/// external job record, which may override a stale local value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStatus {
    /// Not yet submitted to the recovery service
    Pending,
    /// Part of a started job, instance not yet running
    InProgress,
    /// Recovery instance is running
    Launched,
    /// Recovery service reported failure, or the batch could not be placed
    Failed,
    /// Exceeded the non-terminal ceiling with no progress on re-query
    TimedOut,
}

impl LaunchStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Launched | Self::Failed | Self::TimedOut)
    }

    /// Check if the server task counts against an account's capacity ceiling
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

impl fmt::Display for LaunchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Launched => write!(f, "launched"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

impl Default for LaunchStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Post-launch validation status, tracked for production recoveries only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Instance launched, validation not yet started
    Pending,
    /// Validation checks are running
    InProgress,
    /// Validation passed
    Completed,
    /// Validation failed
    Failed,
}

impl ValidationStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_status_terminal_check() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Partial.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Launching.is_terminal());
        assert!(!ExecutionStatus::Polling.is_terminal());
        assert!(!ExecutionStatus::Paused.is_terminal());
    }

    #[test]
    fn test_execution_status_awaiting_index_membership() {
        assert!(ExecutionStatus::Launching.is_awaiting());
        assert!(ExecutionStatus::Polling.is_awaiting());
        assert!(!ExecutionStatus::Pending.is_awaiting());
        assert!(!ExecutionStatus::Paused.is_awaiting());
        assert!(!ExecutionStatus::Completed.is_awaiting());
        assert!(!ExecutionStatus::Cancelled.is_awaiting());
    }

    #[test]
    fn test_wave_status_dependency_satisfaction() {
        assert!(WaveStatus::Completed.satisfies_dependencies());
        assert!(!WaveStatus::Failed.satisfies_dependencies());
        assert!(!WaveStatus::Cancelled.satisfies_dependencies());
        assert!(!WaveStatus::Polling.satisfies_dependencies());
    }

    #[test]
    fn test_launch_status_in_flight() {
        assert!(LaunchStatus::Pending.is_in_flight());
        assert!(LaunchStatus::InProgress.is_in_flight());
        assert!(!LaunchStatus::Launched.is_in_flight());
        assert!(!LaunchStatus::Failed.is_in_flight());
        assert!(!LaunchStatus::TimedOut.is_in_flight());
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(ExecutionStatus::Polling.to_string(), "polling");
        assert_eq!(
            "partial".parse::<ExecutionStatus>().unwrap(),
            ExecutionStatus::Partial
        );
        assert_eq!(LaunchStatus::TimedOut.to_string(), "timed_out");
    }

    #[test]
    fn test_status_serde() {
        let status = ExecutionStatus::Launching;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"launching\"");

        let parsed: ExecutionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }
}
