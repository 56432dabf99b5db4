//! Packages: one extracted bundle and the artifacts it carries

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use keel_core::types::{ArtifactDescriptor, PackageState, ROOT_DESCRIPTOR_FILE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::artifact::{Artifact, ArtifactId};
use crate::error::{DeployError, DeployResult};
use crate::store::ArtifactStore;

/// Identity of a package: (name, optional version)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: Option<String>,
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}_{}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Where a package's files came from and who owns them
#[derive(Debug, Clone)]
pub struct BundleSource {
    /// File name of the bundle (e.g. `orderapp_1.0.0.car`)
    pub bundle_name: String,
    /// Path the host handed to `deploy`
    pub bundle_path: PathBuf,
    /// Directory holding the extracted layout
    pub extracted_path: PathBuf,
    /// Whether `extracted_path` was created for this package and must be deleted with it
    pub owns_extraction: bool,
}

impl BundleSource {
    /// Bundle name without its extension, used when the root descriptor has no name
    pub fn stem(&self) -> &str {
        match self.bundle_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.bundle_name,
        }
    }

    /// Delete the extraction if this package owns it
    pub fn remove_extraction(&self) {
        if !self.owns_extraction {
            return;
        }
        match std::fs::remove_dir_all(&self.extracted_path) {
            Ok(()) => debug!("Removed extraction {}", self.extracted_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove extraction {}: {}",
                self.extracted_path.display(),
                e
            ),
        }
    }
}

/// Result of reading a package's root descriptor
#[derive(Debug)]
pub enum PackageBuild {
    Built(Package),
    /// The root declares no dependencies; there is nothing to deploy
    NoDependencies { name: String },
}

/// A composite bundle moving through the deploy pipeline
#[derive(Debug)]
pub struct Package {
    id: PackageId,
    source: BundleSource,
    main_sequence: Option<String>,
    artifacts: ArtifactStore,
    root: ArtifactId,
    state: Mutex<PackageState>,
    deployment_complete: bool,
    /// Units whose definitions this package registered
    definitions: Vec<String>,
}

impl Package {
    /// Build a package from the root descriptor of an extracted bundle
    pub fn build(source: BundleSource) -> DeployResult<PackageBuild> {
        let descriptor_path = source.extracted_path.join(ROOT_DESCRIPTOR_FILE);
        let descriptor = ArtifactDescriptor::load(&descriptor_path)
            .map_err(|e| DeployError::build(source.bundle_name.clone(), e))?;

        if descriptor.name.is_none() {
            warn!(
                "Root descriptor of {} declares no name, using {}",
                source.bundle_name,
                source.stem()
            );
        }
        let fallback = source.stem().to_string();
        let mut root = Artifact::from_descriptor(&descriptor, Some(&fallback))
            .unwrap_or_else(|| Artifact::new(fallback.clone(), descriptor.version.clone()));
        root = root.with_directory(source.extracted_path.clone());

        if root.dependencies().is_empty() {
            return Ok(PackageBuild::NoDependencies {
                name: root.name().to_string(),
            });
        }

        let id = PackageId::new(root.name(), root.version().map(str::to_string));
        let mut artifacts = ArtifactStore::new();
        let root = artifacts.insert_root(root);

        debug!("Built package {} from {}", id, source.bundle_name);
        Ok(PackageBuild::Built(Package {
            id,
            source,
            main_sequence: descriptor.main_sequence,
            artifacts,
            root,
            state: Mutex::new(PackageState::DescriptorBuilt),
            deployment_complete: false,
            definitions: Vec::new(),
        }))
    }

    pub fn id(&self) -> &PackageId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn version(&self) -> Option<&str> {
        self.id.version.as_deref()
    }

    pub fn source(&self) -> &BundleSource {
        &self.source
    }

    pub fn bundle_name(&self) -> &str {
        &self.source.bundle_name
    }

    pub fn bundle_path(&self) -> &Path {
        &self.source.bundle_path
    }

    pub fn extracted_path(&self) -> &Path {
        &self.source.extracted_path
    }

    pub fn main_sequence(&self) -> Option<&str> {
        self.main_sequence.as_deref()
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub(crate) fn artifacts_mut(&mut self) -> &mut ArtifactStore {
        &mut self.artifacts
    }

    pub fn root(&self) -> ArtifactId {
        self.root
    }

    pub fn root_artifact(&self) -> Option<&Artifact> {
        self.artifacts.get(self.root)
    }

    /// Artifacts reachable from the root through bound dependencies,
    /// depth-first, each listed once
    pub fn deployable_artifacts(&self) -> Vec<ArtifactId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(artifact) = self.artifacts.get(id) else {
                continue;
            };
            if id != self.root {
                order.push(id);
            }
            for dep in artifact.dependencies().iter().rev() {
                if let Some(target) = dep.resolved() {
                    stack.push(target);
                }
            }
        }
        order
    }

    pub fn state(&self) -> PackageState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&self, next: PackageState) -> DeployResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(next) {
            return Err(DeployError::InvalidTransition {
                package: self.id.to_string(),
                from: *state,
                to: next,
            });
        }
        debug!("Package {}: {} -> {}", self.id, *state, next);
        *state = next;
        Ok(())
    }

    pub fn is_deployment_complete(&self) -> bool {
        self.deployment_complete
    }

    pub(crate) fn mark_deployment_complete(&mut self) {
        self.deployment_complete = true;
    }

    pub fn definitions(&self) -> &[String] {
        &self.definitions
    }

    pub(crate) fn set_definitions(&mut self, units: Vec<String>) {
        self.definitions = units;
    }

    /// Delete the extraction if this package owns it
    pub fn remove_extraction(&self) {
        self.source.remove_extraction();
    }
}
