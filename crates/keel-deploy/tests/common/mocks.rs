//! Mock implementations for testing
//!
//! Handlers and collaborators that record every call so tests can assert
//! on ordering without real side effects.

#![allow(dead_code)]

use async_trait::async_trait;
use keel_deploy::{CatalogJob, CatalogPublisher, DeploymentHandler, Package};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared, ordered record of handler calls (`name:phase:package`)
#[derive(Clone, Default, Debug)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries for one phase (`deploy` or `undeploy`)
    pub fn phase(&self, phase: &str) -> Vec<String> {
        let marker = format!(":{}:", phase);
        self.entries()
            .into_iter()
            .filter(|e| e.contains(&marker))
            .collect()
    }

    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }
}

/// Handler that records calls and optionally fails or stalls
pub struct MockHandler {
    name: String,
    log: CallLog,
    fail_deploy: bool,
    fail_deploy_of: Option<String>,
    fail_undeploy: bool,
    deploy_delay: Option<Duration>,
}

impl MockHandler {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            fail_deploy: false,
            fail_deploy_of: None,
            fail_undeploy: false,
            deploy_delay: None,
        }
    }

    /// Fail only the deploy of the package with this id
    pub fn failing_deploy_of(mut self, id: &str) -> Self {
        self.fail_deploy_of = Some(id.to_string());
        self
    }

    /// Sleep inside `on_deploy`, after the call is logged
    pub fn with_deploy_delay(mut self, delay: Duration) -> Self {
        self.deploy_delay = Some(delay);
        self
    }

    pub fn failing_deploy(mut self) -> Self {
        self.fail_deploy = true;
        self
    }

    pub fn failing_undeploy(mut self) -> Self {
        self.fail_undeploy = true;
        self
    }
}

#[async_trait]
impl DeploymentHandler for MockHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_deploy(&self, package: &Package) -> anyhow::Result<()> {
        self.log
            .push(format!("{}:deploy:{}", self.name, package.id()));
        if let Some(delay) = self.deploy_delay {
            tokio::time::sleep(delay).await;
        }
        let targeted = self
            .fail_deploy_of
            .as_deref()
            .is_some_and(|id| package.id().to_string() == id);
        if self.fail_deploy || targeted {
            anyhow::bail!("{} rejected {}", self.name, package.id());
        }
        Ok(())
    }

    async fn on_undeploy(&self, package: &Package) -> anyhow::Result<()> {
        self.log
            .push(format!("{}:undeploy:{}", self.name, package.id()));
        if self.fail_undeploy {
            anyhow::bail!("{} could not remove {}", self.name, package.id());
        }
        Ok(())
    }
}

/// Catalog publisher that keeps every job it receives
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    jobs: Arc<Mutex<Vec<CatalogJob>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<CatalogJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn initial_jobs(&self) -> Vec<CatalogJob> {
        self.jobs().into_iter().filter(|j| !j.incremental).collect()
    }

    pub fn incremental_bundles(&self) -> Vec<String> {
        self.jobs()
            .into_iter()
            .filter(|j| j.incremental)
            .filter_map(|j| j.bundle_name)
            .collect()
    }
}

#[async_trait]
impl CatalogPublisher for RecordingPublisher {
    async fn publish(&self, job: CatalogJob) -> anyhow::Result<()> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}
