//! Data model for recovery plans, executions, waves, and account capacity

pub mod account;
pub mod execution;
pub mod plan;

pub use account::{AccountProfile, AccountRegistry};
pub use execution::{
    AccountJobHandle, Execution, ServerTask, Wave, REASON_CANCELLED, REASON_NO_CAPACITY,
};
pub use plan::{ExecutionKind, FailurePolicy, PlanWave, RecoveryPlan};
