//! Deployment orchestration
//!
//! `deploy` takes one bundle through extract, build, scan, resolve and
//! readiness, then runs the handler chain and records the result in the
//! registry. `undeploy` unwinds a registered package, or forgets a faulty
//! one. Both may run concurrently from many tasks; each pipeline owns its
//! extraction and artifact arena, and only registry updates are serialized.
//! Extraction, descriptor reads and scans run on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use keel_core::types::{DeployerConfig, PackageState};
use tracing::{debug, error, info, warn};

use crate::archive::{BundleExtractor, TarGzExtractor};
use crate::catalog::{CatalogJob, CatalogPublisher, CatalogWorkers, LoggingCatalogPublisher};
use crate::config_store::{ConfigurationStore, InMemoryConfigurationStore};
use crate::error::{DeployError, DeployResult};
use crate::events::{DeploymentEvent, EventEnvelope};
use crate::handler::{HandlerChain, HandlerFailure};
use crate::ledger::DeploymentLedger;
use crate::ordering::ProcessingOrderResolver;
use crate::package::{BundleSource, Package, PackageBuild, PackageId};
use crate::readiness::ReadinessEvaluator;
use crate::registry::{PackageRegistry, Reservation};
use crate::resolver::DependencyResolver;
use crate::scan::ArtifactScanner;

/// Why a deploy request was ignored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file does not carry the bundle extension
    NotABundle,
    /// The root descriptor declares no dependencies
    NoDependencies,
}

/// Result of a deploy request that did not fail outright
#[derive(Debug)]
pub enum DeployOutcome {
    Skipped {
        bundle_name: String,
        reason: SkipReason,
    },
    /// Every handler succeeded and the package is registered
    Deployed { id: PackageId },
    /// Dependencies are missing; nothing was registered
    NotReady {
        id: PackageId,
        missing: Vec<String>,
    },
    /// A handler failed; the package was rolled back and recorded as faulty
    Faulty {
        id: PackageId,
        failure: HandlerFailure,
    },
}

impl DeployOutcome {
    pub fn is_deployed(&self) -> bool {
        matches!(self, DeployOutcome::Deployed { .. })
    }

    pub fn id(&self) -> Option<&PackageId> {
        match self {
            DeployOutcome::Skipped { .. } => None,
            DeployOutcome::Deployed { id }
            | DeployOutcome::NotReady { id, .. }
            | DeployOutcome::Faulty { id, .. } => Some(id),
        }
    }
}

/// Result of an undeploy request
#[derive(Debug)]
pub enum UndeployOutcome {
    /// A registered package was unwound
    Removed {
        id: PackageId,
        handler_failures: Vec<HandlerFailure>,
    },
    /// The bundle had only a fault record, which is now gone
    FaultCleared { bundle_name: String },
    /// Nothing is known about the bundle
    NotFound,
}

/// A definition this attempt registered, with the payload it replaced
#[derive(Debug)]
struct RegisteredDefinition {
    unit: String,
    previous: Option<String>,
}

/// Drives packages through the deploy and undeploy pipelines
pub struct DeploymentOrchestrator {
    config: DeployerConfig,
    registry: Arc<PackageRegistry>,
    handlers: HandlerChain,
    extractor: Arc<dyn BundleExtractor>,
    config_store: Arc<dyn ConfigurationStore>,
    catalog: Option<CatalogWorkers>,
    ledger: Option<DeploymentLedger>,
    ordering: ProcessingOrderResolver,
    scanner: ArtifactScanner,
    resolver: DependencyResolver,
    readiness: ReadinessEvaluator,
}

impl std::fmt::Debug for DeploymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentOrchestrator")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .field("catalog", &self.catalog.is_some())
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

/// Builder for [`DeploymentOrchestrator`]
pub struct OrchestratorBuilder {
    config: DeployerConfig,
    registry: Option<Arc<PackageRegistry>>,
    handlers: HandlerChain,
    extractor: Option<Arc<dyn BundleExtractor>>,
    config_store: Option<Arc<dyn ConfigurationStore>>,
    publisher: Option<Arc<dyn CatalogPublisher>>,
    ledger: Option<DeploymentLedger>,
}

impl OrchestratorBuilder {
    pub fn registry(mut self, registry: Arc<PackageRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn handlers(mut self, handlers: HandlerChain) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn BundleExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn config_store(mut self, store: Arc<dyn ConfigurationStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    /// Publisher used when catalog publishing is enabled in the config
    pub fn catalog_publisher(mut self, publisher: Arc<dyn CatalogPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn ledger(mut self, ledger: DeploymentLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Build the orchestrator. With catalog publishing enabled this starts
    /// the catalog workers and must run inside a tokio runtime.
    pub fn build(self) -> DeploymentOrchestrator {
        let catalog = self.config.catalog.enabled.then(|| {
            let publisher = self
                .publisher
                .unwrap_or_else(|| Arc::new(LoggingCatalogPublisher));
            CatalogWorkers::spawn(publisher)
        });
        let ledger = self.ledger.or_else(|| {
            self.config
                .ledger_path
                .as_ref()
                .map(|p| DeploymentLedger::new(p.as_std_path()))
        });

        DeploymentOrchestrator {
            ordering: ProcessingOrderResolver::from_config(&self.config),
            registry: self.registry.unwrap_or_default(),
            handlers: self.handlers,
            extractor: self
                .extractor
                .unwrap_or_else(|| Arc::new(TarGzExtractor::new())),
            config_store: self
                .config_store
                .unwrap_or_else(|| Arc::new(InMemoryConfigurationStore::new())),
            catalog,
            ledger,
            config: self.config,
            scanner: ArtifactScanner::new(),
            resolver: DependencyResolver::new(),
            readiness: ReadinessEvaluator::new(),
        }
    }
}

impl DeploymentOrchestrator {
    pub fn builder(config: DeployerConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            registry: None,
            handlers: HandlerChain::empty(),
            extractor: None,
            config_store: None,
            publisher: None,
            ledger: None,
        }
    }

    pub fn config(&self) -> &DeployerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PackageRegistry> {
        &self.registry
    }

    pub fn config_store(&self) -> &Arc<dyn ConfigurationStore> {
        &self.config_store
    }

    /// Whether the one-time catalog pass has been submitted
    pub fn catalog_initialized(&self) -> bool {
        self.catalog
            .as_ref()
            .is_some_and(CatalogWorkers::initial_dispatched)
    }

    /// Remove extractions left behind by a previous run
    pub fn init(&self) -> DeployResult<()> {
        let root = self.config.extract_dir.as_std_path();
        if root.exists() {
            std::fs::remove_dir_all(root)?;
            debug!("Cleared extraction root {}", root.display());
        }
        std::fs::create_dir_all(root)?;
        Ok(())
    }

    /// Forget every registered and faulty package
    pub fn cleanup(&self) {
        self.registry.clear();
    }

    /// Sort `pending[start..end]` into processing order
    pub fn sort(&self, pending: &mut [PathBuf], start: usize, end: usize) {
        self.ordering.sort(pending, start, end);
    }

    /// Deploy a bundle file or an already extracted bundle directory
    pub async fn deploy(&self, path: &Path) -> DeployResult<DeployOutcome> {
        let bundle_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let source = if path.is_dir() {
            BundleSource {
                bundle_name: bundle_name.clone(),
                bundle_path: path.to_path_buf(),
                extracted_path: path.to_path_buf(),
                owns_extraction: false,
            }
        } else {
            if !self.config.is_bundle_file_name(&bundle_name) {
                warn!("Skipping {}: not a .{} bundle", path.display(), self.config.bundle_extension);
                return Ok(DeployOutcome::Skipped {
                    bundle_name,
                    reason: SkipReason::NotABundle,
                });
            }
            let extractor = Arc::clone(&self.extractor);
            let bundle = path.to_path_buf();
            let extract_root = self.config.extract_dir.as_std_path().to_path_buf();
            let extracted =
                tokio::task::spawn_blocking(move || extractor.extract(&bundle, &extract_root))
                    .await?
                    .map_err(|e| DeployError::extraction(path, e))?;
            BundleSource {
                bundle_name: bundle_name.clone(),
                bundle_path: path.to_path_buf(),
                extracted_path: extracted,
                owns_extraction: true,
            }
        };

        info!("Deploying {}", bundle_name);
        let outcome = self.deploy_source(source).await?;
        self.publish_catalog(&outcome, &bundle_name);
        Ok(outcome)
    }

    async fn deploy_source(&self, source: BundleSource) -> DeployResult<DeployOutcome> {
        let built = {
            let source = source.clone();
            tokio::task::spawn_blocking(move || Package::build(source)).await
        };
        let package = match built.unwrap_or_else(|e| Err(e.into())) {
            Ok(PackageBuild::Built(package)) => package,
            Ok(PackageBuild::NoDependencies { name }) => {
                warn!("Package {} has no dependencies, nothing to deploy", name);
                discard_extraction(&source).await;
                self.record(
                    &name,
                    None,
                    PackageState::DescriptorBuilt,
                    DeploymentEvent::DeploySkipped {
                        bundle_name: source.bundle_name.clone(),
                        reason: "no dependencies".to_string(),
                    },
                );
                return Ok(DeployOutcome::Skipped {
                    bundle_name: source.bundle_name,
                    reason: SkipReason::NoDependencies,
                });
            }
            Err(e) => {
                discard_extraction(&source).await;
                return Err(e);
            }
        };

        let reservation = match self.registry.reserve(package.id()) {
            Ok(reservation) => reservation,
            Err(e) => {
                discard_extraction(package.source()).await;
                return Err(e);
            }
        };
        if let Some(existing) = self.registry.find(package.id()) {
            warn!(
                "Package {} is registered but incomplete, undeploying it first",
                existing.id()
            );
            self.undeploy_package(&existing).await;
        }

        if let Some(stale) = self.registry.remove_fault_by_path(package.bundle_path()) {
            debug!("Dropping previous fault record of {}", stale.bundle_name);
            discard_extraction(stale.package.source()).await;
        }

        self.record(
            package.name(),
            None,
            PackageState::DescriptorBuilt,
            DeploymentEvent::DeployStarted {
                bundle_name: package.bundle_name().to_string(),
                version: package.version().map(str::to_string),
            },
        );

        let scanner = self.scanner;
        let (mut package, scanned) = tokio::task::spawn_blocking(move || {
            let mut package = package;
            let root = package.root();
            let extracted_path = package.extracted_path().to_path_buf();
            let scanned = scanner.scan(&extracted_path, package.artifacts_mut(), root);
            (package, scanned)
        })
        .await?;
        let scan = match scanned {
            Ok(scan) => scan,
            Err(e) => {
                discard_extraction(package.source()).await;
                return Err(DeployError::Io(e));
            }
        };
        let root = package.root();
        let resolution = self.resolver.resolve(package.artifacts_mut(), root);
        package.transition(PackageState::DependenciesResolved)?;

        if !self.readiness.is_ready(package.artifacts(), Some(root)) {
            let mut missing = self.readiness.missing_dependencies(package.artifacts(), root);
            missing.extend(
                resolution
                    .cycles
                    .iter()
                    .map(|(from, to)| format!("{} -> {} (circular)", from, to)),
            );
            error!(
                "Package {} is not ready: unresolved dependencies {}",
                package.id(),
                missing.join(", ")
            );

            package.transition(PackageState::NotReady)?;
            discard_extraction(package.source()).await;
            self.record(
                package.name(),
                Some(PackageState::DependenciesResolved),
                PackageState::NotReady,
                DeploymentEvent::NotReady {
                    bundle_name: package.bundle_name().to_string(),
                    missing: missing.clone(),
                },
            );
            return Ok(DeployOutcome::NotReady {
                id: package.id().clone(),
                missing,
            });
        }

        package.transition(PackageState::Ready)?;
        let registered = self.register_definitions(&scan.definitions());
        package.set_definitions(registered.iter().map(|d| d.unit.clone()).collect());

        package.transition(PackageState::HandlersRunning)?;
        let started = Instant::now();

        let handled = self.handlers.deploy(&package).await;
        match handled {
            Ok(()) => self.complete(package, reservation, started),
            Err(failure) => {
                let outcome = self.fault(package, &registered, failure, started).await;
                drop(reservation);
                Ok(outcome)
            }
        }
    }

    fn complete(
        &self,
        mut package: Package,
        reservation: Reservation<'_>,
        started: Instant,
    ) -> DeployResult<DeployOutcome> {
        package.transition(PackageState::Deployed)?;
        package.mark_deployment_complete();
        let package = Arc::new(package);
        let id = package.id().clone();
        reservation.commit(Arc::clone(&package));

        info!("Successfully deployed {}", id);
        self.record(
            package.name(),
            Some(PackageState::HandlersRunning),
            PackageState::Deployed,
            DeploymentEvent::DeployCompleted {
                bundle_name: package.bundle_name().to_string(),
                version: package.version().map(str::to_string),
                artifact_count: package.deployable_artifacts().len(),
                duration_ms: started.elapsed().as_millis() as u64,
            },
        );
        Ok(DeployOutcome::Deployed { id })
    }

    async fn fault(
        &self,
        package: Package,
        registered: &[RegisteredDefinition],
        failure: HandlerFailure,
        started: Instant,
    ) -> DeployOutcome {
        error!("Deployment of {} failed: {}", package.id(), failure);

        // Rollback; undeploy failures are logged by the chain
        self.handlers.undeploy(&package).await;
        self.restore_definitions(registered);

        let id = package.id().clone();
        let transitioned = package
            .transition(PackageState::RolledBack)
            .and_then(|()| package.transition(PackageState::Faulty));
        if let Err(e) = transitioned {
            warn!("{}", e);
        }

        self.record(
            package.name(),
            Some(PackageState::HandlersRunning),
            PackageState::Faulty,
            DeploymentEvent::DeployFailed {
                bundle_name: package.bundle_name().to_string(),
                version: package.version().map(str::to_string),
                handler: failure.handler.clone(),
                error_message: format!("{:#}", failure.source),
                duration_ms: started.elapsed().as_millis() as u64,
            },
        );

        let bundle_name = package.bundle_name().to_string();
        self.registry.add_fault(bundle_name, Arc::new(package));
        DeployOutcome::Faulty { id, failure }
    }

    /// Undeploy the bundle at `path`: unwind its registered package, or
    /// drop its fault record
    pub async fn undeploy(&self, path: &Path) -> DeployResult<UndeployOutcome> {
        if let Some(package) = self.registry.find_by_bundle_path(path) {
            let handler_failures = self.undeploy_package(&package).await;
            info!("Undeployed {}", package.id());
            return Ok(UndeployOutcome::Removed {
                id: package.id().clone(),
                handler_failures,
            });
        }

        if let Some(fault) = self.registry.remove_fault_by_path(path) {
            if let Err(e) = fault.package.transition(PackageState::Removed) {
                warn!("{}", e);
            }
            discard_extraction(fault.package.source()).await;
            info!("Removed faulty bundle {}", fault.bundle_name);
            self.record(
                fault.package.name(),
                Some(PackageState::Faulty),
                PackageState::Removed,
                DeploymentEvent::FaultCleared {
                    bundle_name: fault.bundle_name.clone(),
                },
            );
            return Ok(UndeployOutcome::FaultCleared {
                bundle_name: fault.bundle_name,
            });
        }

        debug!("Nothing deployed from {}", path.display());
        Ok(UndeployOutcome::NotFound)
    }

    async fn undeploy_package(&self, package: &Arc<Package>) -> Vec<HandlerFailure> {
        let before = package.state();
        if let Err(e) = package.transition(PackageState::Undeploying) {
            debug!("{}", e);
        }
        self.record(
            package.name(),
            Some(before),
            PackageState::Undeploying,
            DeploymentEvent::UndeployStarted {
                bundle_name: package.bundle_name().to_string(),
            },
        );

        let failures = self.handlers.undeploy(package).await;
        self.registry.remove(package);
        self.remove_definitions(package.definitions());
        discard_extraction(package.source()).await;

        if let Err(e) = package.transition(PackageState::Removed) {
            debug!("{}", e);
        }
        self.record(
            package.name(),
            Some(PackageState::Undeploying),
            PackageState::Removed,
            DeploymentEvent::UndeployCompleted {
                bundle_name: package.bundle_name().to_string(),
                handler_failures: failures.iter().map(|f| f.handler.clone()).collect(),
            },
        );
        failures
    }

    /// Deploy every bundle directory under the configured apps directory
    pub async fn deploy_apps_directory(
        &self,
    ) -> DeployResult<Vec<(PathBuf, DeployResult<DeployOutcome>)>> {
        let apps_dir = self.config.apps_dir.as_std_path();
        if !apps_dir.is_dir() {
            debug!("Apps directory {} does not exist", apps_dir.display());
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(apps_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();

        let mut results = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let outcome = self.deploy(&dir).await;
            results.push((dir, outcome));
        }
        Ok(results)
    }

    /// Stop the catalog workers after their queued jobs finish
    pub async fn shutdown(self) {
        if let Some(catalog) = self.catalog {
            catalog.shutdown().await;
        }
    }

    fn register_definitions(&self, definitions: &[(String, String)]) -> Vec<RegisteredDefinition> {
        let mut registered = Vec::with_capacity(definitions.len());
        for (unit, payload) in definitions {
            let previous = self.config_store.definition(unit);
            match self.config_store.register_definition(unit, payload) {
                Ok(()) => registered.push(RegisteredDefinition {
                    unit: unit.clone(),
                    previous,
                }),
                Err(e) => error!("Failed to register definition for {}: {:#}", unit, e),
            }
        }
        registered
    }

    /// Put back what a failed attempt replaced; units it introduced are removed
    fn restore_definitions(&self, registered: &[RegisteredDefinition]) {
        for definition in registered.iter().rev() {
            let restored = match &definition.previous {
                Some(payload) => self
                    .config_store
                    .register_definition(&definition.unit, payload),
                None => self.config_store.remove_definition(&definition.unit),
            };
            if let Err(e) = restored {
                warn!("Failed to restore definition for {}: {:#}", definition.unit, e);
            }
        }
    }

    fn remove_definitions(&self, units: &[String]) {
        for unit in units {
            if let Err(e) = self.config_store.remove_definition(unit) {
                warn!("Failed to remove definition for {}: {:#}", unit, e);
            }
        }
    }

    fn publish_catalog(&self, outcome: &DeployOutcome, bundle_name: &str) {
        let Some(catalog) = &self.catalog else {
            return;
        };

        if !catalog.initial_dispatched() {
            let total = match self.ordering.bundle_files() {
                Ok(files) => files.len(),
                Err(e) => {
                    warn!("Could not count repository bundles: {}", e);
                    return;
                }
            };
            if self.registry.total_len() == total && catalog.submit_initial(self.catalog_job(None)) {
                info!("All {} bundles processed, publishing service catalog", total);
            }
            return;
        }

        if outcome.is_deployed() {
            catalog.submit_incremental(self.catalog_job(Some(bundle_name.to_string())));
        }
    }

    fn catalog_job(&self, bundle_name: Option<String>) -> CatalogJob {
        CatalogJob {
            incremental: bundle_name.is_some(),
            bundle_name,
            repository: self.config.repository_dir.as_std_path().to_path_buf(),
            config: self.config.catalog.clone(),
        }
    }

    /// Journal an event when a ledger is configured; failures only warn
    fn record(
        &self,
        package_name: &str,
        before: Option<PackageState>,
        after: PackageState,
        event: DeploymentEvent,
    ) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        if let Err(e) = ledger.append(&EventEnvelope::new(package_name, before, after, event)) {
            warn!("Failed to record deployment event: {:#}", e);
        }
    }
}

/// Delete an owned extraction on the blocking pool
async fn discard_extraction(source: &BundleSource) {
    if !source.owns_extraction {
        return;
    }
    let source = source.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || source.remove_extraction()).await {
        warn!("Extraction cleanup task failed: {}", e);
    }
}
