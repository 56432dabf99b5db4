//! Readiness evaluation
//!
//! An artifact is ready when every dependency is bound to a ready artifact
//! and its own unresolved count is zero. Both conditions are checked: the
//! structural links and the bookkeeping count must agree.

use std::collections::HashSet;

use tracing::warn;

use crate::artifact::ArtifactId;
use crate::store::ArtifactStore;

/// Recursive readiness checks over a package's artifact arena
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadinessEvaluator;

impl ReadinessEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Whether `artifact` and its entire dependency subtree are resolved.
    /// `None` is never ready.
    pub fn is_ready(&self, store: &ArtifactStore, artifact: Option<ArtifactId>) -> bool {
        let mut on_path = HashSet::new();
        Self::check(store, artifact, &mut on_path)
    }

    fn check(
        store: &ArtifactStore,
        artifact: Option<ArtifactId>,
        on_path: &mut HashSet<ArtifactId>,
    ) -> bool {
        let Some(id) = artifact else {
            return false;
        };
        let Some(current) = store.get(id) else {
            return false;
        };

        if !on_path.insert(id) {
            warn!(
                "Artifact {} depends on itself through its dependency tree",
                current.name()
            );
            return false;
        }

        for dep in current.dependencies() {
            if !Self::check(store, dep.resolved(), on_path) {
                return false;
            }
        }
        on_path.remove(&id);

        current.unresolved_dep_count() == 0
    }

    /// Labels of every unresolved dependency reachable from `root`,
    /// prefixed with the artifact that declares it (`owner -> dep`)
    pub fn missing_dependencies(&self, store: &ArtifactStore, root: ArtifactId) -> Vec<String> {
        let mut missing = Vec::new();
        let mut seen = HashSet::new();
        Self::collect_missing(store, root, &mut seen, &mut missing);
        missing
    }

    fn collect_missing(
        store: &ArtifactStore,
        id: ArtifactId,
        seen: &mut HashSet<ArtifactId>,
        missing: &mut Vec<String>,
    ) {
        if !seen.insert(id) {
            return;
        }
        let Some(artifact) = store.get(id) else {
            return;
        };

        for dep in artifact.dependencies() {
            match dep.resolved() {
                Some(target) => Self::collect_missing(store, target, seen, missing),
                None => missing.push(format!("{} -> {}", artifact.name(), dep.label())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Artifact, Dependency};
    use crate::resolver::DependencyResolver;

    fn dep(name: &str) -> Dependency {
        Dependency::new(name, None)
    }

    #[test]
    fn test_none_is_not_ready() {
        let store = ArtifactStore::new();
        assert!(!ReadinessEvaluator::new().is_ready(&store, None));
    }

    #[test]
    fn test_leaf_is_ready() {
        let mut store = ArtifactStore::new();
        let root = store.insert_root(Artifact::new("app", None));
        assert!(ReadinessEvaluator::new().is_ready(&store, Some(root)));
    }

    #[test]
    fn test_resolved_tree_is_ready() {
        let mut store = ArtifactStore::new();
        let root = store.insert_root(Artifact::new("app", None).with_dependencies(vec![dep("a")]));
        store.insert(Artifact::new("a", None).with_dependencies(vec![dep("b")]));
        store.insert(Artifact::new("b", None));

        DependencyResolver::new().resolve(&mut store, root);

        let evaluator = ReadinessEvaluator::new();
        assert!(evaluator.is_ready(&store, Some(root)));
        assert!(evaluator.missing_dependencies(&store, root).is_empty());
    }

    #[test]
    fn test_missing_transitive_dependency() {
        let mut store = ArtifactStore::new();
        let root = store.insert_root(Artifact::new("app", None).with_dependencies(vec![dep("a")]));
        store.insert(Artifact::new("a", None).with_dependencies(vec![dep("ghost")]));

        DependencyResolver::new().resolve(&mut store, root);

        let evaluator = ReadinessEvaluator::new();
        assert!(!evaluator.is_ready(&store, Some(root)));
        assert_eq!(
            evaluator.missing_dependencies(&store, root),
            vec!["a -> ghost".to_string()]
        );
    }

    #[test]
    fn test_cycle_is_not_ready() {
        let mut store = ArtifactStore::new();
        let root = store.insert_root(Artifact::new("app", None).with_dependencies(vec![dep("a")]));
        store.insert(Artifact::new("a", None).with_dependencies(vec![dep("b")]));
        store.insert(Artifact::new("b", None).with_dependencies(vec![dep("a")]));

        DependencyResolver::new().resolve(&mut store, root);

        assert!(!ReadinessEvaluator::new().is_ready(&store, Some(root)));
    }
}
