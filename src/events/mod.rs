//! # Execution Lifecycle Events
//!
//! Fire-and-forget notification contract. Notification failures are logged
//! and never fail the orchestration operation that triggered them.

pub mod publisher;

pub use publisher::EventPublisher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle event types emitted by the orchestration engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionEventType {
    ExecutionStarted,
    WaveLaunched,
    WaveCompleted,
    ExecutionPaused,
    ExecutionResumed,
    ExecutionCompleted,
    ExecutionPartial,
    ExecutionFailed,
    ExecutionCancelled,
    InstancesTerminated,
}

/// One lifecycle notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub execution_id: Uuid,
    pub event_type: ExecutionEventType,
    pub detail: Value,
    pub occurred_at: DateTime<Utc>,
}

impl ExecutionEvent {
    pub fn new(execution_id: Uuid, event_type: ExecutionEventType, detail: Value) -> Self {
        Self {
            execution_id,
            event_type,
            detail,
            occurred_at: Utc::now(),
        }
    }
}

/// Notification channel contract: best-effort delivery, no error surface
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: ExecutionEvent);
}
