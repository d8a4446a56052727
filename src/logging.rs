//! # Structured Logging Module
//!
//! Environment-aware structured logging for orchestration traces. Console
//! output only; log aggregation belongs to the deployment, not the crate.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults.
///
/// Idempotent: repeat calls (including from embedding hosts that already set
/// a global subscriber) are no-ops.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level.clone()));
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter),
        );

        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
            return;
        }

        tracing::info!(
            environment = %environment,
            log_level = %log_level,
            "🔧 structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("FAILOVER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for execution lifecycle operations
pub fn log_execution_operation(
    operation: &str,
    execution_id: Option<&str>,
    wave: Option<u32>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        execution_id = execution_id,
        wave = wave,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🌊 EXECUTION_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("unknown"), "debug");
    }
}
