use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum FailoverError {
    StateTransitionError(String),
    OrchestrationError(String),
    StoreError(String),
    ClientError(String),
    ValidationError(String),
    ConfigurationError(String),
    EventError(String),
}

impl fmt::Display for FailoverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailoverError::StateTransitionError(msg) => {
                write!(f, "State transition error: {msg}")
            }
            FailoverError::OrchestrationError(msg) => write!(f, "Orchestration error: {msg}"),
            FailoverError::StoreError(msg) => write!(f, "Store error: {msg}"),
            FailoverError::ClientError(msg) => write!(f, "Client error: {msg}"),
            FailoverError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            FailoverError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            FailoverError::EventError(msg) => write!(f, "Event error: {msg}"),
        }
    }
}

impl std::error::Error for FailoverError {}

impl From<crate::orchestration::OrchestrationError> for FailoverError {
    fn from(e: crate::orchestration::OrchestrationError) -> Self {
        FailoverError::OrchestrationError(e.to_string())
    }
}

impl From<crate::store::StoreError> for FailoverError {
    fn from(e: crate::store::StoreError) -> Self {
        FailoverError::StoreError(e.to_string())
    }
}

impl From<crate::validation::ValidationError> for FailoverError {
    fn from(e: crate::validation::ValidationError) -> Self {
        FailoverError::ValidationError(e.to_string())
    }
}

impl From<crate::config::ConfigurationError> for FailoverError {
    fn from(e: crate::config::ConfigurationError) -> Self {
        FailoverError::ConfigurationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FailoverError>;
