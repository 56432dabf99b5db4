//! Scratch deployment environments
//!
//! Every test gets its own repository, apps and extraction directories
//! under a temporary root.

#![allow(dead_code)]

use camino::Utf8PathBuf;
use keel_core::types::DeployerConfig;
use keel_deploy::{DeploymentOrchestrator, HandlerChain};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directories plus a config pointing at them
pub struct TestEnv {
    temp_dir: TempDir,
    pub config: DeployerConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap();

        let config = DeployerConfig {
            repository_dir: root.join("repository/bundles"),
            apps_dir: root.join("repository/apps"),
            extract_dir: root.join("tmp/bundles"),
            ..DeployerConfig::default()
        };
        fs::create_dir_all(&config.repository_dir).unwrap();
        fs::create_dir_all(&config.apps_dir).unwrap();
        fs::create_dir_all(&config.extract_dir).unwrap();

        Self { temp_dir, config }
    }

    pub fn with_catalog(mut self) -> Self {
        self.config.catalog.enabled = true;
        self.config.catalog.endpoint = Some("http://catalog.local".to_string());
        self
    }

    pub fn with_ledger(mut self) -> Self {
        let ledger = Utf8PathBuf::from_path_buf(self.root().join("journal/deployments.jsonl")).unwrap();
        self.config.ledger_path = Some(ledger);
        self
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn repository(&self) -> &Path {
        self.config.repository_dir.as_std_path()
    }

    pub fn apps(&self) -> &Path {
        self.config.apps_dir.as_std_path()
    }

    pub fn extract_root(&self) -> &Path {
        self.config.extract_dir.as_std_path()
    }

    /// Entries currently under the extraction root
    pub fn extractions(&self) -> Vec<PathBuf> {
        match fs::read_dir(self.extract_root()) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn orchestrator(&self, handlers: HandlerChain) -> DeploymentOrchestrator {
        DeploymentOrchestrator::builder(self.config.clone())
            .handlers(handlers)
            .build()
    }
}
