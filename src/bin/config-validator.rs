//! # Failover Configuration Validator
//!
//! Command-line tool for validating failover engine configuration files
//! before deployment. Exits non-zero on the first invalid file.
//!
//! Usage: `config-validator [CONFIG_FILE ...]`
//!
//! With no arguments it validates the default configuration plus any
//! `FAILOVER_`-prefixed environment overrides.

use anyhow::Context;
use failover_core::config::ConfigManager;
use std::path::Path;
use tracing::info;

fn main() -> anyhow::Result<()> {
    failover_core::logging::init_structured_logging();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        let manager =
            ConfigManager::load().context("default configuration failed validation")?;
        info!(
            environment = manager.environment(),
            "configuration valid (defaults + environment overrides)"
        );
        println!("OK: defaults + environment overrides");
        return Ok(());
    }

    for path in &paths {
        let manager = ConfigManager::load_from_file(Path::new(path))
            .with_context(|| format!("{path} failed validation"))?;
        info!(path = %path, environment = manager.environment(), "configuration valid");
        println!("OK: {path}");
    }
    Ok(())
}
