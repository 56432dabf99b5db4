//! Bundle builders for creating test fixtures
//!
//! Provides fluent builders that write a bundle layout to disk, either as
//! an extracted directory or packed into a bundle file.

#![allow(dead_code)]

use keel_core::types::{
    ArtifactDescriptor, BundleReference, DependencyDescriptor, OrderingDescriptor,
    ARTIFACT_DESCRIPTOR_FILE, ORDERING_DESCRIPTOR_FILE, ROOT_DESCRIPTOR_FILE,
};
use std::fs;
use std::path::{Path, PathBuf};

/// One artifact directory inside a bundle
#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
    dir: Option<String>,
    name: String,
    version: Option<String>,
    artifact_type: Option<String>,
    dependencies: Vec<DependencyDescriptor>,
    files: Vec<(String, String)>,
}

impl ArtifactBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            dir: None,
            name: name.to_string(),
            version: None,
            artifact_type: None,
            dependencies: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn artifact_type(mut self, artifact_type: &str) -> Self {
        self.artifact_type = Some(artifact_type.to_string());
        self
    }

    pub fn depends_on(mut self, name: &str, version: Option<&str>) -> Self {
        self.dependencies.push(DependencyDescriptor {
            name: name.to_string(),
            version: version.map(str::to_string),
        });
        self
    }

    pub fn file(mut self, name: &str, content: &str) -> Self {
        self.files.push((name.to_string(), content.to_string()));
        self
    }

    /// Directory name; defaults to `name_version` or `name`
    pub fn in_dir(mut self, dir: &str) -> Self {
        self.dir = Some(dir.to_string());
        self
    }

    fn dir_name(&self) -> String {
        self.dir.clone().unwrap_or_else(|| match &self.version {
            Some(v) => format!("{}_{}", self.name, v),
            None => self.name.clone(),
        })
    }

    fn write(&self, parent: &Path) -> PathBuf {
        let dir = parent.join(self.dir_name());
        fs::create_dir_all(&dir).unwrap();
        let descriptor = ArtifactDescriptor {
            name: Some(self.name.clone()),
            version: self.version.clone(),
            artifact_type: self.artifact_type.clone(),
            main_sequence: None,
            dependencies: self.dependencies.clone(),
            files: self.files.iter().map(|(name, _)| name.clone()).collect(),
        };
        fs::write(
            dir.join(ARTIFACT_DESCRIPTOR_FILE),
            serde_yaml_ng::to_string(&descriptor).unwrap(),
        )
        .unwrap();
        for (name, content) in &self.files {
            fs::write(dir.join(name), content).unwrap();
        }
        dir
    }
}

/// Builder for a whole bundle
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    name: Option<String>,
    version: Option<String>,
    dependencies: Vec<DependencyDescriptor>,
    artifacts: Vec<ArtifactBuilder>,
    metadata: Vec<ArtifactBuilder>,
    ordering: Option<OrderingDescriptor>,
}

impl BundleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            version: None,
            dependencies: Vec::new(),
            artifacts: Vec::new(),
            metadata: Vec::new(),
            ordering: None,
        }
    }

    /// A bundle whose root descriptor declares no name
    pub fn unnamed() -> Self {
        Self {
            name: None,
            ..Self::new("")
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Root dependency
    pub fn depends_on(mut self, name: &str, version: Option<&str>) -> Self {
        self.dependencies.push(DependencyDescriptor {
            name: name.to_string(),
            version: version.map(str::to_string),
        });
        self
    }

    pub fn artifact(mut self, artifact: ArtifactBuilder) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Artifact under the bundle's `metadata/` directory
    pub fn metadata(mut self, artifact: ArtifactBuilder) -> Self {
        self.metadata.push(artifact);
        self
    }

    pub fn ordering(mut self, id: &str, order: Option<u32>, dependencies: &[&str]) -> Self {
        self.ordering = Some(OrderingDescriptor {
            id: id.to_string(),
            order,
            dependencies: dependencies
                .iter()
                .map(|d| BundleReference { id: d.to_string() })
                .collect(),
        });
        self
    }

    /// Write the extracted layout into `dir`
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let root = ArtifactDescriptor {
            name: self.name.clone(),
            version: self.version.clone(),
            artifact_type: Some("bundle/application".to_string()),
            main_sequence: None,
            dependencies: self.dependencies.clone(),
            files: Vec::new(),
        };
        fs::write(
            dir.join(ROOT_DESCRIPTOR_FILE),
            serde_yaml_ng::to_string(&root).unwrap(),
        )
        .unwrap();

        if let Some(ordering) = &self.ordering {
            fs::write(
                dir.join(ORDERING_DESCRIPTOR_FILE),
                serde_yaml_ng::to_string(ordering).unwrap(),
            )
            .unwrap();
        }
        for artifact in &self.artifacts {
            artifact.write(dir);
        }
        if !self.metadata.is_empty() {
            let metadata_dir = dir.join("metadata");
            for artifact in &self.metadata {
                artifact.write(&metadata_dir);
            }
        }
        dir.to_path_buf()
    }

    /// Pack the bundle into `repository/<file_name>`
    pub fn pack(&self, repository: &Path, file_name: &str) -> PathBuf {
        let staging = tempfile::tempdir().unwrap();
        self.write_to(staging.path());
        let bundle = repository.join(file_name);
        keel_deploy::pack_bundle(staging.path(), &bundle).unwrap();
        bundle
    }
}

/// The `orderapp` bundle: svc-a unversioned, svc-b 2.0 with a decoy 1.0
pub fn orderapp_bundle() -> BundleBuilder {
    BundleBuilder::new("orderapp")
        .version("1.0.0")
        .depends_on("svc-a", None)
        .depends_on("svc-b", Some("2.0"))
        .artifact(ArtifactBuilder::new("svc-a").file("svc-a.yaml", "kind: service\n"))
        .artifact(ArtifactBuilder::new("svc-b").version("1.0").file("svc-b.yaml", "release: old\n"))
        .artifact(ArtifactBuilder::new("svc-b").version("2.0").file("svc-b.yaml", "release: new\n"))
}
