//! Composite bundle deployment for Keel
//!
//! This crate handles:
//! - Bundle extraction and artifact discovery
//! - Dependency tree resolution and readiness checks
//! - Handler chains for deploy and rollback
//! - Registries of deployed and faulty packages
//! - Processing order across pending bundles
//! - Service catalog publishing and the deployment journal

pub mod archive;
pub mod artifact;
pub mod catalog;
pub mod config_store;
pub mod error;
pub mod events;
pub mod handler;
pub mod ledger;
pub mod ordering;
pub mod orchestrator;
pub mod package;
pub mod readiness;
pub mod registry;
pub mod resolver;
pub mod scan;
pub mod store;

pub use archive::{pack_bundle, BundleExtractor, TarGzExtractor};
pub use artifact::{Artifact, ArtifactId, Dependency};
pub use catalog::{CatalogJob, CatalogPublisher, LoggingCatalogPublisher};
pub use config_store::{ConfigurationStore, InMemoryConfigurationStore};
pub use error::{DeployError, DeployResult, OrderingError};
pub use handler::{DeploymentHandler, HandlerChain, HandlerFailure, StagingHandler};
pub use ledger::DeploymentLedger;
pub use orchestrator::{DeployOutcome, DeploymentOrchestrator, SkipReason, UndeployOutcome};
pub use ordering::ProcessingOrderResolver;
pub use package::{Package, PackageId};
pub use readiness::ReadinessEvaluator;
pub use registry::{FaultRecord, PackageRegistry, Reservation};
pub use resolver::DependencyResolver;
pub use store::ArtifactStore;
