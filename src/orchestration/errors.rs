//! Orchestration error taxonomy
//!
//! Transient recovery-service errors are absorbed by the retry policy and
//! never reach this level unless exhausted. Validation errors are rejected
//! at the API boundary before any record is created. Everything else maps
//! onto the variants here.

use crate::state_machine::{ExecutionStatus, StateMachineError};
use crate::store::StoreError;
use crate::validation::ValidationError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    #[error("wave {wave} not found in execution {execution_id}")]
    WaveNotFound { execution_id: Uuid, wave: u32 },

    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] ValidationError),

    #[error("execution {execution_id} is not paused (status: {status})")]
    NotPaused {
        execution_id: Uuid,
        status: ExecutionStatus,
    },

    #[error("operation invalid for execution {execution_id} in status {status}")]
    InvalidState {
        execution_id: Uuid,
        status: ExecutionStatus,
    },

    #[error(transparent)]
    Transition(#[from] StateMachineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;
