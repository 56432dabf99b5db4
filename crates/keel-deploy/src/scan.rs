//! Artifact discovery inside an extracted bundle
//!
//! Every immediate subdirectory of the extraction root is inspected in
//! directory-name order:
//! - a directory with `artifact.yaml` becomes a discovered artifact
//! - a directory without one whose name ends in `metadata` holds auxiliary
//!   artifacts; their names are removed from the root's dependencies and
//!   the ones marked `_openapi` carry a definition payload
//! - anything else is ignored

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use keel_core::types::{
    ArtifactDescriptor, UnitDefinition, API_ARTIFACT_TYPE, ARTIFACT_DESCRIPTOR_FILE,
    DEFINITION_MARKER, METADATA_DIR_SUFFIX,
};
use tracing::{debug, error, warn};

use crate::artifact::{Artifact, ArtifactId};
use crate::store::ArtifactStore;

/// What a scan found besides the artifacts it inserted
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Number of artifacts added to the store
    pub discovered: usize,
    /// Artifact directories whose descriptor could not be used
    pub skipped: Vec<PathBuf>,
    /// Definition payloads keyed by the artifact base name (name up to `_openapi`)
    pub payloads: BTreeMap<String, String>,
    /// Artifact name to unit name for `api` artifacts
    pub api_units: HashMap<String, String>,
    /// Root dependencies dropped because a metadata artifact satisfies them
    pub removed_dependencies: usize,
}

impl ScanReport {
    /// Payloads whose base name belongs to a known API unit, as (unit, payload)
    pub fn definitions(&self) -> Vec<(String, String)> {
        self.payloads
            .iter()
            .filter_map(|(base, payload)| {
                self.api_units
                    .get(base)
                    .map(|unit| (unit.clone(), payload.clone()))
            })
            .collect()
    }
}

/// Scans an extraction root and fills a package's artifact store
#[derive(Debug, Default, Clone, Copy)]
pub struct ArtifactScanner;

impl ArtifactScanner {
    pub fn new() -> Self {
        Self
    }

    /// Discover artifacts under `root_dir` into `store`. Metadata artifacts
    /// adjust the dependencies of `root`.
    pub fn scan(
        &self,
        root_dir: &Path,
        store: &mut ArtifactStore,
        root: ArtifactId,
    ) -> std::io::Result<ScanReport> {
        let mut report = ScanReport::default();

        for dir in sorted_subdirectories(root_dir)? {
            let descriptor_path = dir.join(ARTIFACT_DESCRIPTOR_FILE);
            if descriptor_path.is_file() {
                self.discover_artifact(&dir, &descriptor_path, store, &mut report);
            } else if dir_name(&dir).ends_with(METADATA_DIR_SUFFIX) {
                self.scan_metadata(&dir, store, root, &mut report)?;
            } else {
                debug!("Ignoring directory without descriptor: {}", dir.display());
            }
        }

        debug!(
            "Discovered {} artifacts under {}",
            report.discovered,
            root_dir.display()
        );
        Ok(report)
    }

    fn discover_artifact(
        &self,
        dir: &Path,
        descriptor_path: &Path,
        store: &mut ArtifactStore,
        report: &mut ScanReport,
    ) {
        let artifact = match ArtifactDescriptor::load(descriptor_path) {
            Ok(desc) => Artifact::from_descriptor(&desc, None),
            Err(e) => {
                error!("Failed to build artifact from {}: {}", descriptor_path.display(), e);
                report.skipped.push(dir.to_path_buf());
                return;
            }
        };
        let Some(artifact) = artifact else {
            error!("Artifact descriptor {} declares no name", descriptor_path.display());
            report.skipped.push(dir.to_path_buf());
            return;
        };

        if artifact.artifact_type() == Some(API_ARTIFACT_TYPE) {
            match artifact.files().first() {
                Some(file) => {
                    if let Some(unit) = UnitDefinition::name_from_file(&dir.join(file)) {
                        report.api_units.insert(artifact.name().to_string(), unit);
                    }
                }
                None => warn!("API artifact {} lists no files", artifact.name()),
            }
        }

        store.insert(artifact.with_directory(dir));
        report.discovered += 1;
    }

    fn scan_metadata(
        &self,
        metadata_dir: &Path,
        store: &mut ArtifactStore,
        root: ArtifactId,
        report: &mut ScanReport,
    ) -> std::io::Result<()> {
        for inner in sorted_subdirectories(metadata_dir)? {
            let descriptor_path = inner.join(ARTIFACT_DESCRIPTOR_FILE);
            let artifact = match ArtifactDescriptor::load(&descriptor_path) {
                Ok(desc) => Artifact::from_descriptor(&desc, None),
                Err(e) => {
                    error!("Could not read metadata artifact {}: {}", inner.display(), e);
                    continue;
                }
            };
            let Some(artifact) = artifact else {
                error!("Metadata artifact {} declares no name", inner.display());
                continue;
            };

            if let Some(root_artifact) = store.get_mut(root) {
                let removed = root_artifact.remove_dependencies_named(artifact.name());
                if removed > 0 {
                    debug!("Dropped metadata dependency {} from root", artifact.name());
                }
                report.removed_dependencies += removed;
            }

            if !dir_name(&inner).contains(DEFINITION_MARKER) {
                continue;
            }
            let Some((base, _)) = artifact.name().split_once(DEFINITION_MARKER) else {
                warn!(
                    "Metadata artifact {} carries a payload but its name has no {} marker",
                    artifact.name(),
                    DEFINITION_MARKER
                );
                continue;
            };
            let Some(file) = artifact.files().first() else {
                warn!("Metadata artifact {} lists no payload file", artifact.name());
                continue;
            };
            match fs::read_to_string(inner.join(file)) {
                Ok(payload) => {
                    report.payloads.insert(base.to_string(), payload);
                }
                Err(e) => error!(
                    "Error reading definition payload of {}: {}",
                    artifact.name(),
                    e
                ),
            }
        }
        Ok(())
    }
}

fn sorted_subdirectories(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
