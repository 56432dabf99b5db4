//! CLI command implementations

pub mod check;
pub mod deploy;
pub mod history;
pub mod order;
pub mod pack;

use anyhow::{Context, Result};
use camino::Utf8Path;
use keel_core::types::DeployerConfig;
use keel_core::KeelConfig;

/// Load the effective deployer configuration
pub(crate) fn load_config(path: Option<&Utf8Path>) -> Result<DeployerConfig> {
    let loaded = KeelConfig::load(path).context("Failed to load configuration")?;
    if let Some(config_path) = &loaded.config_path {
        tracing::debug!("Using configuration {}", config_path);
    }
    Ok(loaded.config)
}
