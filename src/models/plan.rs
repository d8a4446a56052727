use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of execution: non-destructive drill or production recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    /// Non-destructive recovery test; instances are torn down afterward
    Drill,
    /// Production failover/failback; launched instances persist and require
    /// post-launch validation before a wave can complete
    Recovery,
}

impl ExecutionKind {
    /// Whether launched servers must pass post-launch validation
    pub fn requires_validation(&self) -> bool {
        matches!(self, Self::Recovery)
    }

    /// Drill flag passed to the recovery service on job start
    pub fn is_drill(&self) -> bool {
        matches!(self, Self::Drill)
    }
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drill => write!(f, "drill"),
            Self::Recovery => write!(f, "recovery"),
        }
    }
}

/// How the execution reacts to failed server tasks at wave boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failed or timed-out task fails the whole execution at wave advance
    Strict,
    /// Failed tasks are recorded and the execution continues, finishing
    /// `Partial` if any task failed
    Lenient,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Lenient
    }
}

/// An ordered stage of a recovery plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanWave {
    /// Wave number, unique within the plan; dependencies may only reference
    /// lower numbers
    pub number: u32,
    pub name: String,
    /// Wave numbers that must be completed before this wave launches
    #[serde(default)]
    pub depends_on: Vec<u32>,
    /// Hold the execution at a manual pause point before launching this wave
    #[serde(default)]
    pub pause_before: bool,
    /// Servers launched together in this wave
    pub server_ids: Vec<String>,
}

/// Operator-defined recovery plan: ordered waves of servers with
/// dependencies and optional manual pause points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    pub waves: Vec<PlanWave>,
}

impl RecoveryPlan {
    /// Total number of servers across all waves
    pub fn server_count(&self) -> usize {
        self.waves.iter().map(|w| w.server_ids.len()).sum()
    }
}
