//! Deployer configuration types
//!
//! These types define where bundles are found, where they are unpacked,
//! and how the catalog publisher is reached.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete deployer configuration (`keel.yaml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeployerConfig {
    /// Directory holding bundle archives
    #[serde(default = "default_repository_dir")]
    pub repository_dir: Utf8PathBuf,

    /// Directory holding already-extracted bundles
    #[serde(default = "default_apps_dir")]
    pub apps_dir: Utf8PathBuf,

    /// Working directory bundles are extracted into
    #[serde(default = "default_extract_dir")]
    pub extract_dir: Utf8PathBuf,

    /// Extension (without the dot) identifying bundle archives
    #[serde(default = "default_bundle_extension")]
    pub bundle_extension: String,

    /// Catalog publishing settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Deployment event ledger location; no ledger when unset
    #[serde(default)]
    pub ledger_path: Option<Utf8PathBuf>,
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            repository_dir: default_repository_dir(),
            apps_dir: default_apps_dir(),
            extract_dir: default_extract_dir(),
            bundle_extension: default_bundle_extension(),
            catalog: CatalogConfig::default(),
            ledger_path: None,
        }
    }
}

impl DeployerConfig {
    /// Whether a file name carries the bundle extension
    pub fn is_bundle_file_name(&self, file_name: &str) -> bool {
        file_name
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && ext == self.bundle_extension)
    }
}

/// Catalog publishing configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogConfig {
    /// Publish deployed bundles to the catalog
    #[serde(default)]
    pub enabled: bool,

    /// Catalog endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Extra publisher settings passed through untouched
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

fn default_repository_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("repository/bundles")
}

fn default_apps_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("repository/apps")
}

fn default_extract_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("tmp/bundles")
}

fn default_bundle_extension() -> String {
    "car".to_string()
}
