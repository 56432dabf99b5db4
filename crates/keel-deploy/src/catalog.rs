//! Service catalog publishing
//!
//! Two single-task queues: one for the full pass over the repository that
//! runs once the startup deployments are all accounted for, one for the
//! per-bundle passes after it. Jobs in a queue run in submission order and
//! never block the deploy that submitted them.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use keel_core::types::CatalogConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// One catalog publish request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogJob {
    /// Bundle to publish; `None` publishes the whole repository
    pub bundle_name: Option<String>,
    pub repository: PathBuf,
    pub config: CatalogConfig,
    pub incremental: bool,
}

/// Downstream catalog service
#[async_trait]
pub trait CatalogPublisher: Send + Sync {
    async fn publish(&self, job: CatalogJob) -> anyhow::Result<()>;
}

/// Publisher that only logs what it would publish
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCatalogPublisher;

#[async_trait]
impl CatalogPublisher for LoggingCatalogPublisher {
    async fn publish(&self, job: CatalogJob) -> anyhow::Result<()> {
        let endpoint = job.config.endpoint.as_deref().unwrap_or("<unset>");
        match &job.bundle_name {
            Some(bundle) => info!("Publishing {} to service catalog at {}", bundle, endpoint),
            None => info!(
                "Publishing all bundles in {} to service catalog at {}",
                job.repository.display(),
                endpoint
            ),
        }
        Ok(())
    }
}

/// The two publishing queues and their worker tasks
#[derive(Debug)]
pub struct CatalogWorkers {
    initial: mpsc::UnboundedSender<CatalogJob>,
    incremental: mpsc::UnboundedSender<CatalogJob>,
    initial_dispatched: AtomicBool,
    handles: Vec<JoinHandle<()>>,
}

impl CatalogWorkers {
    /// Start both workers. Must be called from within a tokio runtime.
    pub fn spawn(publisher: Arc<dyn CatalogPublisher>) -> Self {
        let (initial, initial_rx) = mpsc::unbounded_channel();
        let (incremental, incremental_rx) = mpsc::unbounded_channel();

        let handles = vec![
            tokio::spawn(run_worker("initial", initial_rx, Arc::clone(&publisher))),
            tokio::spawn(run_worker("incremental", incremental_rx, publisher)),
        ];

        Self {
            initial,
            incremental,
            initial_dispatched: AtomicBool::new(false),
            handles,
        }
    }

    /// Queue the full pass. Only the first call submits; later calls
    /// return `false`.
    pub fn submit_initial(&self, job: CatalogJob) -> bool {
        if self
            .initial_dispatched
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if self.initial.send(job).is_err() {
            error!("Catalog worker has stopped; initial publish dropped");
        }
        true
    }

    pub fn submit_incremental(&self, job: CatalogJob) {
        if self.incremental.send(job).is_err() {
            error!("Catalog worker has stopped; incremental publish dropped");
        }
    }

    pub fn initial_dispatched(&self) -> bool {
        self.initial_dispatched.load(Ordering::Acquire)
    }

    /// Close both queues and wait for queued jobs to finish
    pub async fn shutdown(self) {
        let Self {
            initial,
            incremental,
            handles,
            ..
        } = self;
        drop(initial);
        drop(incremental);
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Catalog worker panicked: {}", e);
            }
        }
    }
}

async fn run_worker(
    queue: &'static str,
    mut jobs: mpsc::UnboundedReceiver<CatalogJob>,
    publisher: Arc<dyn CatalogPublisher>,
) {
    while let Some(job) = jobs.recv().await {
        debug!("Catalog {} job for {:?}", queue, job.bundle_name);
        if let Err(e) = publisher.publish(job).await {
            error!("Catalog {} publish failed: {:#}", queue, e);
        }
    }
    debug!("Catalog {} worker stopped", queue);
}
