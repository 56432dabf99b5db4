//! Deployment handlers
//!
//! A [`HandlerChain`] is built once and never changes. Deploy runs the
//! handlers in registration order and stops at the first failure; undeploy
//! runs every handler in reverse order and keeps going past failures.

mod staging;

pub use staging::StagingHandler;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error};

use crate::package::Package;

/// A pluggable step that makes a package's artifacts live
#[async_trait]
pub trait DeploymentHandler: Send + Sync {
    /// Handler name, used in logs and failure reports
    fn name(&self) -> &str;

    /// Deploy the package's artifacts
    async fn on_deploy(&self, package: &Package) -> anyhow::Result<()>;

    /// Undo `on_deploy`. Called for rollback too, so it must tolerate
    /// packages this handler never deployed.
    async fn on_undeploy(&self, package: &Package) -> anyhow::Result<()>;
}

/// A handler that failed, with its error
#[derive(Error, Debug)]
#[error("Handler {handler} failed: {source:#}")]
pub struct HandlerFailure {
    pub handler: String,
    #[source]
    pub source: anyhow::Error,
}

/// Ordered, immutable handler list
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn DeploymentHandler>>,
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

impl HandlerChain {
    pub fn builder() -> HandlerChainBuilder {
        HandlerChainBuilder::default()
    }

    /// A chain without handlers; every ready package deploys trivially
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Run `on_deploy` in registration order, stopping at the first failure
    pub async fn deploy(&self, package: &Package) -> Result<(), HandlerFailure> {
        for handler in &self.handlers {
            debug!("Running deploy handler {} for {}", handler.name(), package.id());
            handler
                .on_deploy(package)
                .await
                .map_err(|source| HandlerFailure {
                    handler: handler.name().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Run `on_undeploy` in reverse order. Every handler runs; failures are
    /// logged and returned.
    pub async fn undeploy(&self, package: &Package) -> Vec<HandlerFailure> {
        let mut failures = Vec::new();
        for handler in self.handlers.iter().rev() {
            debug!("Running undeploy handler {} for {}", handler.name(), package.id());
            if let Err(source) = handler.on_undeploy(package).await {
                error!(
                    "Undeploy handler {} failed for {}: {:#}",
                    handler.name(),
                    package.id(),
                    source
                );
                failures.push(HandlerFailure {
                    handler: handler.name().to_string(),
                    source,
                });
            }
        }
        failures
    }
}

/// Builder for [`HandlerChain`]
#[derive(Default)]
pub struct HandlerChainBuilder {
    handlers: Vec<Arc<dyn DeploymentHandler>>,
}

impl HandlerChainBuilder {
    /// Append a handler; registration order is deploy order
    pub fn register(mut self, handler: impl DeploymentHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Append an already shared handler
    pub fn register_shared(mut self, handler: Arc<dyn DeploymentHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build(self) -> HandlerChain {
        HandlerChain {
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{BundleSource, PackageBuild};
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        fail_deploy: bool,
        fail_undeploy: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl DeploymentHandler for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn on_deploy(&self, _package: &Package) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("deploy:{}", self.name));
            if self.fail_deploy {
                anyhow::bail!("{} refused", self.name);
            }
            Ok(())
        }

        async fn on_undeploy(&self, _package: &Package) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("undeploy:{}", self.name));
            if self.fail_undeploy {
                anyhow::bail!("{} stuck", self.name);
            }
            Ok(())
        }
    }

    fn recorder(
        name: &'static str,
        fail_deploy: bool,
        fail_undeploy: bool,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Recorder {
        Recorder {
            name,
            fail_deploy,
            fail_undeploy,
            log: Arc::clone(log),
        }
    }

    fn package(dir: &std::path::Path) -> Package {
        std::fs::write(
            dir.join("artifacts.yaml"),
            "name: app\ndependencies:\n  - name: svc-a\n",
        )
        .unwrap();
        let source = BundleSource {
            bundle_name: "app.car".to_string(),
            bundle_path: dir.to_path_buf(),
            extracted_path: dir.to_path_buf(),
            owns_extraction: false,
        };
        match Package::build(source).unwrap() {
            PackageBuild::Built(p) => p,
            other => panic!("unexpected build result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deploy_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = HandlerChain::builder()
            .register(recorder("first", false, false, &log))
            .register(recorder("second", true, false, &log))
            .register(recorder("third", false, false, &log))
            .build();

        let failure = chain.deploy(&package(dir.path())).await.unwrap_err();

        assert_eq!(failure.handler, "second");
        assert_eq!(*log.lock().unwrap(), vec!["deploy:first", "deploy:second"]);
    }

    #[tokio::test]
    async fn test_undeploy_runs_reverse_and_collects_failures() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = HandlerChain::builder()
            .register(recorder("first", false, false, &log))
            .register(recorder("second", false, true, &log))
            .register(recorder("third", false, false, &log))
            .build();

        let failures = chain.undeploy(&package(dir.path())).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].handler, "second");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["undeploy:third", "undeploy:second", "undeploy:first"]
        );
    }

    #[test]
    fn test_chain_names_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = HandlerChain::builder()
            .register(recorder("a", false, false, &log))
            .register(recorder("b", false, false, &log))
            .build();
        assert_eq!(chain.names(), vec!["a", "b"]);
        assert!(HandlerChain::empty().is_empty());
    }
}
