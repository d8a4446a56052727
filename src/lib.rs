#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Failover Core
//!
//! Disaster-recovery failover orchestration engine. Executes recovery plans
//! as ordered waves of server launches against an external recovery service,
//! with dependency gating, operator pause points, adaptive completion
//! polling, and per-account rate limiting.
//!
//! ## Overview
//!
//! A recovery plan groups servers into numbered waves. Starting an execution
//! validates the wave dependency graph, snapshots the plan into a durable
//! execution record, and launches every wave with no unmet dependencies.
//! Launches are batched per back-end account through a deterministic
//! partitioner, one external job per batch. A completion poller then
//! reconciles in-flight jobs against the service and advances waves as their
//! tasks reach terminal states.
//!
//! ## Key Features
//!
//! - **Wave ordering**: a wave never launches before its declared
//!   dependencies complete
//! - **Pause points**: executions stop before flagged waves until an
//!   operator resumes
//! - **Partial failure**: one account's launch failure fails its batch, not
//!   the wave; the failure policy decides the execution outcome
//! - **Externalized state**: all coordination flows through the execution
//!   store with optimistic conditional writes; any process can resume work
//! - **Per-account throttling**: token-bucket admission per (region,
//!   account) plus bounded exponential retry with jitter
//!
//! ## Module Organization
//!
//! - [`models`] - Recovery plans, executions, waves, and server tasks
//! - [`state_machine`] - Execution lifecycle transitions
//! - [`orchestration`] - Wave coordinator, completion poller, partitioner
//! - [`client`] - Typed recovery-service client with rate limiting + retry
//! - [`resilience`] - Token buckets and retry policy
//! - [`store`] - Execution store contract and in-memory implementation
//! - [`events`] - Lifecycle event publishing
//! - [`config`] - Configuration loading and validation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use failover_core::config::ConfigManager;
//! use failover_core::models::{ExecutionKind, RecoveryPlan};
//!
//! # async fn example(plan: RecoveryPlan) -> Result<(), Box<dyn std::error::Error>> {
//! failover_core::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//! println!(
//!     "engine configured for {} poll workers",
//!     manager.config().poller.max_concurrency
//! );
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod state_machine;
pub mod store;
pub mod validation;

pub use error::{FailoverError, Result};
pub use models::{Execution, ExecutionKind, FailurePolicy, RecoveryPlan};
pub use orchestration::{CompletionPoller, WaveCoordinator};
