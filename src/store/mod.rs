//! # Execution Store
//!
//! Durable record of every execution. This module defines the contracts the
//! orchestration engine requires — point lookups, conditional writes, and
//! the "awaiting completion" index — without prescribing a storage engine.
//! An in-memory implementation ships in-crate; the trait is the seam for a
//! durable backend.
//!
//! Conditional writes are keyed on the record's `version` field so that a
//! concurrent coordinator write (e.g. pause) and poller write (status
//! advance) can never silently clobber each other.

pub mod memory;

pub use memory::InMemoryExecutionStore;

use crate::models::Execution;
use async_trait::async_trait;
use uuid::Uuid;

/// Store-level error taxonomy
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("execution {0} not found")]
    NotFound(Uuid),

    #[error("execution {0} already exists")]
    AlreadyExists(Uuid),

    #[error("version conflict on execution {execution_id}: expected {expected}, found {found}")]
    VersionConflict {
        execution_id: Uuid,
        expected: u64,
        found: u64,
    },

    /// Backend-specific failure surfaced by a durable implementation
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durability and query contracts required by the orchestration engine
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Point lookup by execution id
    async fn get(&self, execution_id: Uuid) -> StoreResult<Option<Execution>>;

    /// Insert a new execution record; fails if the id already exists
    async fn create(&self, execution: Execution) -> StoreResult<()>;

    /// Conditional write: succeeds only if the stored version matches the
    /// record's version, then bumps the version and updated-at timestamp.
    /// Returns the stored record so callers continue from fresh state.
    async fn update(&self, execution: Execution) -> StoreResult<Execution>;

    /// One page of execution ids whose status is in {Launching, Polling}.
    /// This index is the poller's sole discovery mechanism; its read latency
    /// must not grow with total historical execution count.
    async fn list_awaiting(&self, page: usize, page_size: usize) -> StoreResult<Vec<Uuid>>;
}
