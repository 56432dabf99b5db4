//! Descriptor documents found inside a bundle
//!
//! A bundle carries three kinds of YAML documents:
//! - `artifacts.yaml` at the bundle root, declaring the package and the
//!   artifacts it depends on
//! - `artifact.yaml` in every artifact directory
//! - an optional `descriptor.yaml` at the bundle root with ordering metadata

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root descriptor file name
pub const ROOT_DESCRIPTOR_FILE: &str = "artifacts.yaml";

/// Per-artifact descriptor file name
pub const ARTIFACT_DESCRIPTOR_FILE: &str = "artifact.yaml";

/// Ordering metadata file name
pub const ORDERING_DESCRIPTOR_FILE: &str = "descriptor.yaml";

/// Suffix of the directory holding auxiliary metadata artifacts
pub const METADATA_DIR_SUFFIX: &str = "metadata";

/// Marker in metadata directory and artifact names that carry a definition payload
pub const DEFINITION_MARKER: &str = "_openapi";

/// Artifact type of externally addressable units
pub const API_ARTIFACT_TYPE: &str = "api";

/// Artifact descriptor (`artifact.yaml`, and `artifacts.yaml` for the root)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArtifactDescriptor {
    /// Declared artifact name; required everywhere except the root
    #[serde(default)]
    pub name: Option<String>,

    /// Declared version, if any
    #[serde(default)]
    pub version: Option<String>,

    /// Artifact type (e.g. `api`, `service`, `bundle/application`)
    #[serde(rename = "type", default)]
    pub artifact_type: Option<String>,

    /// Entry sequence of the package (root descriptor only)
    #[serde(default)]
    pub main_sequence: Option<String>,

    /// Declared dependencies, in declaration order
    #[serde(default)]
    pub dependencies: Vec<DependencyDescriptor>,

    /// Files associated with the artifact, relative to its directory
    #[serde(default)]
    pub files: Vec<String>,
}

/// A dependency reference inside an artifact descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,
}

impl ArtifactDescriptor {
    /// Parse a descriptor from YAML text. `origin` is only used in error messages.
    pub fn from_yaml(content: &str, origin: &str) -> Result<Self> {
        let mut descriptor: ArtifactDescriptor = serde_yaml_ng::from_str(content)
            .map_err(|e| Error::invalid_descriptor(origin, e.to_string()))?;
        descriptor.normalize();
        Ok(descriptor)
    }

    /// Load a descriptor from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::descriptor_not_found(path.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;
        Self::from_yaml(&content, &path.display().to_string())
    }

    /// Empty strings in YAML mean "not specified"
    fn normalize(&mut self) {
        fn blank_to_none(value: &mut Option<String>) {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }

        blank_to_none(&mut self.name);
        blank_to_none(&mut self.version);
        blank_to_none(&mut self.artifact_type);
        blank_to_none(&mut self.main_sequence);
        for dep in &mut self.dependencies {
            blank_to_none(&mut dep.version);
        }
    }
}

/// Ordering metadata (`descriptor.yaml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OrderingDescriptor {
    /// Identifier other bundles use to depend on this one
    pub id: String,

    /// Optional position hint; lower values deploy earlier
    #[serde(default)]
    pub order: Option<u32>,

    /// Bundles that must be processed before this one
    #[serde(default)]
    pub dependencies: Vec<BundleReference>,
}

/// Reference to another bundle by ordering id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleReference {
    pub id: String,
}

impl OrderingDescriptor {
    pub fn from_yaml(content: &str, origin: &str) -> Result<Self> {
        serde_yaml_ng::from_str(content).map_err(|e| Error::invalid_descriptor(origin, e.to_string()))
    }
}

/// The part of an API definition file needed to learn the unit name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitDefinition {
    #[serde(default)]
    pub name: Option<String>,
}

impl UnitDefinition {
    /// Read only the declared name; any failure yields `None`
    pub fn name_from_file(path: &Path) -> Option<String> {
        let content = std::fs::read_to_string(path).ok()?;
        let definition: UnitDefinition = serde_yaml_ng::from_str(&content).ok()?;
        definition.name.filter(|n| !n.trim().is_empty())
    }
}
