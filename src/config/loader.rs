//! Configuration Loader
//!
//! Environment-aware configuration loading. Discovers the active environment
//! from `FAILOVER_ENV` (falling back to `APP_ENV`, then `development`),
//! layers an optional TOML file under `FAILOVER_`-prefixed environment
//! variables, and validates the result before handing it out.

use super::{ConfigResult, FailoverConfig};
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded configuration plus the environment it was resolved for
pub struct ConfigManager {
    config: FailoverConfig,
    environment: String,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection and no file,
    /// yielding defaults plus environment-variable overrides
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with(None, &Self::detect_environment())
    }

    /// Load configuration from an explicit TOML file
    pub fn load_from_file(path: &Path) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with(Some(path), &Self::detect_environment())
    }

    /// Explicit environment variant, used by tests to avoid mutating
    /// process-global environment variables
    pub fn load_with(path: Option<&Path>, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), environment, "loading configuration file");
            builder = builder.add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }
        let settings = builder
            .add_source(Environment::with_prefix("FAILOVER").separator("__"))
            .build()?;

        let config: FailoverConfig = settings.try_deserialize()?;
        config.validate()?;

        info!(
            environment,
            refill_rate = config.rate_limiter.refill_rate_per_sec,
            max_attempts = config.retry.max_attempts,
            poll_concurrency = config.poller.max_concurrency,
            "✅ configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
        }))
    }

    pub fn config(&self) -> &FailoverConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    fn detect_environment() -> String {
        env::var("FAILOVER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }
}
