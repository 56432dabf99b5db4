//! Staging handler: copies artifact files into a deployment directory

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::DeploymentHandler;
use crate::package::Package;

/// Copies every file of every artifact reachable from the package root
/// into `<target>/<package id>/<artifact name>/`
#[derive(Debug, Clone)]
pub struct StagingHandler {
    target: PathBuf,
}

impl StagingHandler {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Directory holding a package's staged artifacts
    pub fn package_dir(&self, package: &Package) -> PathBuf {
        self.target.join(package.id().to_string())
    }
}

#[async_trait]
impl DeploymentHandler for StagingHandler {
    fn name(&self) -> &str {
        "staging"
    }

    async fn on_deploy(&self, package: &Package) -> Result<()> {
        let package_dir = self.package_dir(package);
        let mut copied = 0usize;

        for id in package.deployable_artifacts() {
            let Some(artifact) = package.artifacts().get(id) else {
                continue;
            };
            let Some(source_dir) = artifact.directory() else {
                continue;
            };
            let artifact_dir = package_dir.join(artifact.name());
            tokio::fs::create_dir_all(&artifact_dir)
                .await
                .with_context(|| format!("Failed to create {}", artifact_dir.display()))?;

            for file in artifact.files() {
                let from = source_dir.join(file);
                let to = artifact_dir.join(file);
                if let Some(parent) = to.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(&from, &to).await.with_context(|| {
                    format!(
                        "Failed to stage {} of artifact {}",
                        from.display(),
                        artifact.name()
                    )
                })?;
                copied += 1;
            }
        }

        info!(
            "Staged {} files of {} into {}",
            copied,
            package.id(),
            package_dir.display()
        );
        Ok(())
    }

    async fn on_undeploy(&self, package: &Package) -> Result<()> {
        let package_dir = self.package_dir(package);
        match tokio::fs::remove_dir_all(&package_dir).await {
            Ok(()) => {
                debug!("Removed staged files at {}", package_dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove {}", package_dir.display())),
        }
    }
}
