//! Artifacts and their dependency declarations

use keel_core::types::{ArtifactDescriptor, DependencyDescriptor};
use std::fmt;
use std::path::{Path, PathBuf};

/// Index of an artifact inside its package's [`ArtifactStore`](crate::store::ArtifactStore)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(pub(crate) usize);

impl ArtifactId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dependency on another artifact by (name, version)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    name: String,
    version: Option<String>,
    resolved: Option<ArtifactId>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
            resolved: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Artifact this dependency was bound to, if any
    pub fn resolved(&self) -> Option<ArtifactId> {
        self.resolved
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// An unspecified version only matches an unversioned artifact;
    /// otherwise the version strings must be equal.
    pub fn matches(&self, name: &str, version: Option<&str>) -> bool {
        self.name == name && self.version.as_deref() == version
    }

    /// Bind to `target`. A dependency is bound at most once; later calls
    /// leave the first binding in place and return `false`.
    pub(crate) fn bind(&mut self, target: ArtifactId) -> bool {
        if self.resolved.is_some() {
            return false;
        }
        self.resolved = Some(target);
        true
    }

    /// `name` or `name:version`, for log messages
    pub fn label(&self) -> String {
        match &self.version {
            Some(v) => format!("{}:{}", self.name, v),
            None => self.name.clone(),
        }
    }
}

impl From<&DependencyDescriptor> for Dependency {
    fn from(desc: &DependencyDescriptor) -> Self {
        Dependency::new(desc.name.clone(), desc.version.clone())
    }
}

/// One deployable unit inside a bundle
#[derive(Debug, Clone)]
pub struct Artifact {
    name: String,
    version: Option<String>,
    artifact_type: Option<String>,
    dependencies: Vec<Dependency>,
    files: Vec<String>,
    directory: Option<PathBuf>,
    unresolved_dep_count: usize,
}

impl Artifact {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
            artifact_type: None,
            dependencies: Vec::new(),
            files: Vec::new(),
            directory: None,
            unresolved_dep_count: 0,
        }
    }

    /// Build an artifact from its descriptor. `fallback_name` is used when
    /// the descriptor does not declare a name; `None` makes a nameless
    /// descriptor an error (returned as `None`).
    pub fn from_descriptor(desc: &ArtifactDescriptor, fallback_name: Option<&str>) -> Option<Self> {
        let name = desc
            .name
            .clone()
            .or_else(|| fallback_name.map(str::to_string))?;

        let mut artifact = Artifact::new(name, desc.version.clone())
            .with_files(desc.files.clone())
            .with_dependencies(desc.dependencies.iter().map(Dependency::from).collect());
        artifact.artifact_type = desc.artifact_type.clone();
        Some(artifact)
    }

    pub fn with_type(mut self, artifact_type: impl Into<String>) -> Self {
        self.artifact_type = Some(artifact_type.into());
        self
    }

    /// Replace the dependency list; the unresolved count starts at its length
    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.unresolved_dep_count = dependencies.iter().filter(|d| !d.is_resolved()).count();
        self.dependencies = dependencies;
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn artifact_type(&self) -> Option<&str> {
        self.artifact_type.as_deref()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Directory the artifact was discovered in
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn unresolved_dep_count(&self) -> usize {
        self.unresolved_dep_count
    }

    /// `name` or `name_version`
    pub fn name_with_version(&self) -> String {
        match &self.version {
            Some(v) => format!("{}_{}", self.name, v),
            None => self.name.clone(),
        }
    }

    /// Bind dependency `index` to `target`, decrementing the unresolved
    /// count once. Returns `false` if the dependency was already bound.
    pub(crate) fn bind_dependency(&mut self, index: usize, target: ArtifactId) -> bool {
        let Some(dep) = self.dependencies.get_mut(index) else {
            return false;
        };
        if dep.bind(target) {
            self.unresolved_dep_count = self.unresolved_dep_count.saturating_sub(1);
            true
        } else {
            false
        }
    }

    /// Drop every unresolved dependency named `name`, decrementing the
    /// unresolved count per removed entry. Returns how many were removed.
    pub(crate) fn remove_dependencies_named(&mut self, name: &str) -> usize {
        let before = self.dependencies.len();
        self.dependencies
            .retain(|d| d.is_resolved() || d.name() != name);
        let removed = before - self.dependencies.len();
        self.unresolved_dep_count = self.unresolved_dep_count.saturating_sub(removed);
        removed
    }
}
