//! State machine components for execution, wave, and server-task lifecycles

pub mod execution;
pub mod states;

pub use execution::{next_status, ExecutionEvent, StateMachineError, StateMachineResult};
pub use states::{ExecutionStatus, LaunchStatus, ValidationStatus, WaveStatus};
