//! Typed recovery-service responses and error taxonomy
//!
//! The external API reports loosely structured job documents. They are
//! converted to tagged variants here, at the client boundary, so code
//! downstream never branches on raw status strings.

use crate::resilience::retry::RetryClass;
use serde::{Deserialize, Serialize};

/// Overall status of one external recovery job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Started,
    Completed,
}

/// Per-server launch status as reported by the recovery service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerLaunchState {
    Pending,
    InProgress,
    Launched,
    Failed,
}

/// Post-launch validation status as reported by the recovery service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceValidationState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One server's record within a job description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerJobRecord {
    pub server_id: String,
    pub launch_state: ServerLaunchState,
    /// Present once the server's recovery instance is running
    pub instance_id: Option<String>,
}

/// Authoritative description of one recovery job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub job_id: String,
    pub status: JobStatus,
    pub servers: Vec<ServerJobRecord>,
}

/// Recovery-service error taxonomy
#[derive(Debug, Clone, thiserror::Error)]
pub enum RecoveryClientError {
    /// Backend throttled the call
    #[error("recovery service throttled the request: {0}")]
    Throttled(String),

    /// Transient network failure
    #[error("network timeout calling recovery service: {0}")]
    NetworkTimeout(String),

    /// Recoverable service-side failure
    #[error("recovery service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Job id is unknown to the service; authoritative and terminal
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Instance id is unknown to the service
    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    /// Capability was rejected
    #[error("access denied for account {account_id}: {message}")]
    AccessDenied { account_id: String, message: String },

    /// Request rejected by service-side validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Rate-limiter admission timed out before the call was made
    #[error("rate limiter admission timed out: {0}")]
    AdmissionTimeout(String),
}

impl RetryClass for RecoveryClientError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Throttled(_)
                | Self::NetworkTimeout(_)
                | Self::ServiceUnavailable(_)
                | Self::AdmissionTimeout(_)
        )
    }
}
