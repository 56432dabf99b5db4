//! Deployment error taxonomy
//!
//! Only failures that stop a package before it can be evaluated leave
//! `deploy` as errors. Skips, unready packages and handler failures are
//! reported through [`DeployOutcome`](crate::orchestrator::DeployOutcome)
//! and registry state instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::package::PackageId;

/// Result type alias for deployment operations
pub type DeployResult<T> = std::result::Result<T, DeployError>;

#[derive(Error, Debug)]
pub enum DeployError {
    /// The bundle could not be unpacked
    #[error("Failed to extract bundle {path}: {source}")]
    Extraction {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The root descriptor is missing, unreadable or malformed
    #[error("Failed to build package from {bundle}: {source}")]
    Build {
        bundle: String,
        #[source]
        source: keel_core::Error,
    },

    /// A completed package with the same identity is already deployed
    #[error("Package {id} already exists. Two packages can't have the same id. Deployment aborted.")]
    AlreadyDeployed { id: PackageId },

    /// Another deploy of the same identity is running
    #[error("Package {id} is already being deployed. Deployment aborted.")]
    DeployInProgress { id: PackageId },

    /// A blocking deploy step was cancelled or panicked
    #[error("Deploy task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Internal state machine violation
    #[error("Invalid state transition for {package}: {from} -> {to}")]
    InvalidTransition {
        package: String,
        from: keel_core::types::PackageState,
        to: keel_core::types::PackageState,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    pub fn build(bundle: impl Into<String>, source: keel_core::Error) -> Self {
        Self::Build {
            bundle: bundle.into(),
            source,
        }
    }

    pub fn extraction(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::Extraction {
            path: path.into(),
            source,
        }
    }
}

/// Failure to compute a processing order from ordering metadata
#[derive(Error, Debug)]
pub enum OrderingError {
    #[error("Failed to read ordering descriptor of {bundle}: {source}")]
    Descriptor {
        bundle: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Bundle {bundle} has no ordering descriptor")]
    MissingDescriptor { bundle: String },

    #[error("Bundles {first} and {second} share ordering id {id}")]
    DuplicateId {
        id: String,
        first: String,
        second: String,
    },

    #[error("Bundle {bundle} depends on unknown bundle id {id}")]
    UnknownDependency { bundle: String, id: String },

    #[error("Circular dependency between bundles: {}", bundles.join(", "))]
    Cycle { bundles: Vec<String> },
}
