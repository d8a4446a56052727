//! # Orchestration Layer
//!
//! Coordinates failover executions end to end: the wave coordinator owns
//! lifecycle transitions and wave launches, the completion poller reconciles
//! in-flight jobs against the external recovery service, and the account
//! partitioner turns a wave's server list into per-account job batches.
//!
//! ## Architecture
//!
//! ```text
//! WaveCoordinator ──── launches ────▶ RecoveryClient ───▶ external service
//!       ▲    │
//!       │    └── AccountPartitioner (deterministic batching)
//!       │
//! CompletionPoller ── reconciles ──▶ ExecutionStore (conditional writes)
//! ```
//!
//! The coordinator and poller share no in-memory state: every handoff goes
//! through the store, so either side can restart without losing work.

pub mod completion_poller;
pub mod errors;
pub mod partitioner;
pub mod wave_coordinator;

pub use completion_poller::{CompletionPoller, PollOutcome, PollSummary, PollerConfig};
pub use errors::{OrchestrationError, OrchestrationResult};
pub use partitioner::{AccountPartitioner, PartitionOutcome, PlannedBatch};
pub use wave_coordinator::{WaveCoordinator, WaveCoordinatorConfig};
