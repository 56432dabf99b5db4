//! Per-package artifact arena
//!
//! Every artifact of a package, including its root, lives in one
//! `ArtifactStore`. Dependencies refer to each other through [`ArtifactId`]s,
//! so the dependency tree never holds references into itself.

use crate::artifact::{Artifact, ArtifactId};

/// Arena of artifacts discovered under one extracted package
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    artifacts: Vec<Artifact>,
    /// Deployable artifacts in discovery order (the root is not one of them)
    discovered: Vec<ArtifactId>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the package's root artifact. It takes part in resolution as the
    /// starting point but is never a binding candidate.
    pub fn insert_root(&mut self, artifact: Artifact) -> ArtifactId {
        self.push(artifact)
    }

    /// Add a discovered artifact; discovery order is insertion order
    pub fn insert(&mut self, artifact: Artifact) -> ArtifactId {
        let id = self.push(artifact);
        self.discovered.push(id);
        id
    }

    fn push(&mut self, artifact: Artifact) -> ArtifactId {
        let id = ArtifactId(self.artifacts.len());
        self.artifacts.push(artifact);
        id
    }

    pub fn get(&self, id: ArtifactId) -> Option<&Artifact> {
        self.artifacts.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: ArtifactId) -> Option<&mut Artifact> {
        self.artifacts.get_mut(id.0)
    }

    /// Discovered artifacts in discovery order
    pub fn discovered(&self) -> impl Iterator<Item = (ArtifactId, &Artifact)> + '_ {
        self.discovered
            .iter()
            .filter_map(move |id| self.get(*id).map(|a| (*id, a)))
    }

    /// First discovered artifact matching (name, version) under the
    /// dependency matching rule
    pub fn find_first(&self, name: &str, version: Option<&str>) -> Option<ArtifactId> {
        self.discovered()
            .find(|(_, a)| a.name() == name && a.version() == version)
            .map(|(id, _)| id)
    }

    pub fn discovered_len(&self) -> usize {
        self.discovered.len()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
