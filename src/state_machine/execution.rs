//! # Execution State Machine
//!
//! Transition table for the execution-level lifecycle:
//!
//! ```text
//! PENDING -> LAUNCHING -> POLLING <-> PAUSED -> COMPLETED | PARTIAL | FAILED | CANCELLED
//! ```
//!
//! Every status change on an [`crate::models::Execution`] goes through
//! [`next_status`], so an invalid transition surfaces as a typed error
//! instead of silently corrupting the record.

use super::states::ExecutionStatus;

/// Events that drive execution-level transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// A wave launch has started
    BeginLaunch,
    /// All launch calls returned; jobs are now polled
    BeginPolling,
    /// A pause-before-wave flag was hit
    Pause,
    /// Operator resumed a paused execution
    Resume,
    /// Every wave completed with no failed tasks
    Complete,
    /// Every wave finished but some tasks failed (lenient policy)
    CompletePartial,
    /// Strict-policy wave failure or unrecoverable error
    Fail(String),
    /// Operator-initiated cancellation
    Cancel,
}

/// Errors raised by the transition table
#[derive(Debug, Clone, thiserror::Error)]
pub enum StateMachineError {
    #[error("invalid execution transition from {from} on {event}")]
    InvalidTransition { from: ExecutionStatus, event: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Determine the target status for an event, or reject the transition.
pub fn next_status(
    current: ExecutionStatus,
    event: &ExecutionEvent,
) -> StateMachineResult<ExecutionStatus> {
    use ExecutionStatus as S;

    let target = match (current, event) {
        // Launch path
        (S::Pending, ExecutionEvent::BeginLaunch) => S::Launching,
        (S::Polling, ExecutionEvent::BeginLaunch) => S::Launching,
        (S::Launching, ExecutionEvent::BeginPolling) => S::Polling,

        // Manual pause points
        (S::Pending, ExecutionEvent::Pause) => S::Paused,
        (S::Polling, ExecutionEvent::Pause) => S::Paused,
        (S::Paused, ExecutionEvent::Resume) => S::Launching,

        // Terminal outcomes
        (S::Polling, ExecutionEvent::Complete) => S::Completed,
        (S::Polling, ExecutionEvent::CompletePartial) => S::Partial,
        (S::Pending, ExecutionEvent::Fail(_))
        | (S::Launching, ExecutionEvent::Fail(_))
        | (S::Polling, ExecutionEvent::Fail(_))
        | (S::Paused, ExecutionEvent::Fail(_)) => S::Failed,

        // Cancel is valid in any non-terminal status
        (from, ExecutionEvent::Cancel) if !from.is_terminal() => S::Cancelled,

        (from, event) => {
            return Err(StateMachineError::InvalidTransition {
                from,
                event: format!("{event:?}"),
            })
        }
    };

    Ok(target)
}
