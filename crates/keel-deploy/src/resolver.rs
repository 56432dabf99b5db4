//! Dependency tree linking using depth-first search
//!
//! Binding policy: for each dependency, the discovered artifacts are scanned
//! in discovery order and the **first** one whose (name, version) matches is
//! bound. There is no best-match or duplicate detection; when a bundle
//! carries two artifacts with the same identity, the one discovered first
//! wins.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::artifact::ArtifactId;
use crate::store::ArtifactStore;

/// A dependency bound during resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub from: ArtifactId,
    pub dependency: String,
    pub to: ArtifactId,
}

/// A dependency no discovered artifact satisfies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnboundDependency {
    pub artifact: String,
    pub dependency: String,
}

/// Outcome of a resolution pass
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    pub bound: Vec<Binding>,
    pub unbound: Vec<UnboundDependency>,
    /// Dependency edges that lead back into the artifact path being resolved
    pub cycles: Vec<(String, String)>,
}

impl ResolutionReport {
    pub fn is_complete(&self) -> bool {
        self.unbound.is_empty() && self.cycles.is_empty()
    }
}

/// Dependency resolver linking a root artifact to the discovered artifacts
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyResolver;

struct Walk {
    visited: HashSet<ArtifactId>,
    on_path: HashSet<ArtifactId>,
    report: ResolutionReport,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Link the dependency tree under `root` in one depth-first pass.
    ///
    /// Unbound dependencies are reported, not treated as errors; readiness
    /// evaluation decides what they mean.
    pub fn resolve(&self, store: &mut ArtifactStore, root: ArtifactId) -> ResolutionReport {
        let mut walk = Walk {
            visited: HashSet::new(),
            on_path: HashSet::new(),
            report: ResolutionReport::default(),
        };

        Self::link(store, root, &mut walk);

        debug!(
            "Resolution finished: {} bound, {} unbound",
            walk.report.bound.len(),
            walk.report.unbound.len()
        );
        walk.report
    }

    fn link(store: &mut ArtifactStore, id: ArtifactId, walk: &mut Walk) {
        // Diamonds: an artifact's dependencies are linked once
        if !walk.visited.insert(id) {
            return;
        }
        walk.on_path.insert(id);

        let dep_count = store.get(id).map(|a| a.dependencies().len()).unwrap_or(0);

        for index in 0..dep_count {
            let Some(artifact) = store.get(id) else {
                break;
            };
            let owner = artifact.name().to_string();
            let dep = &artifact.dependencies()[index];
            let label = dep.label();

            let target = match dep.resolved() {
                Some(existing) => existing,
                None => {
                    let Some(candidate) = store.find_first(dep.name(), dep.version()) else {
                        debug!("No artifact satisfies {} -> {}", owner, label);
                        walk.report.unbound.push(UnboundDependency {
                            artifact: owner,
                            dependency: label,
                        });
                        continue;
                    };

                    if let Some(artifact) = store.get_mut(id) {
                        artifact.bind_dependency(index, candidate);
                    }
                    debug!("Bound {} -> {} ({})", owner, label, candidate);
                    walk.report.bound.push(Binding {
                        from: id,
                        dependency: label.clone(),
                        to: candidate,
                    });
                    candidate
                }
            };

            if walk.on_path.contains(&target) {
                warn!("Circular dependency detected: {} -> {}", owner, label);
                walk.report.cycles.push((owner, label));
                continue;
            }

            Self::link(store, target, walk);
        }

        walk.on_path.remove(&id);
    }
}
