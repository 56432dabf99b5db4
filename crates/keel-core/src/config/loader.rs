//! Configuration file loading and parsing
//!
//! Precedence (low to high):
//! 1. Built-in defaults
//! 2. `keel.yaml` (explicit path, or searched upward from the current directory)
//! 3. Environment variables (`KEEL_*` prefix)

use crate::error::{Error, Result};
use crate::types::DeployerConfig;
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::fs;
use tracing::debug;

/// Configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["keel.yaml", "keel.yml"];

/// Loaded deployer configuration
#[derive(Debug, Clone)]
pub struct KeelConfig {
    /// The effective configuration, with relative paths resolved
    pub config: DeployerConfig,

    /// Path to the configuration file, if one was found
    pub config_path: Option<Utf8PathBuf>,

    /// Directory relative paths are resolved against
    pub working_dir: Utf8PathBuf,
}

impl KeelConfig {
    /// Load configuration from the specified path or search for it.
    ///
    /// An explicit path that does not exist is an error; a failed search
    /// falls back to defaults rooted at the current directory.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let found = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        Error::config_not_found(p.as_str())
                    } else {
                        Error::Io(e)
                    }
                })?;
                Some((p.to_owned(), content))
            }
            None => Self::find_config()?,
        };

        let (config, config_path, working_dir) = match found {
            Some((config_path, content)) => {
                debug!("Loading configuration from {}", config_path);
                let config: DeployerConfig = serde_yaml_ng::from_str(&content)?;
                let working_dir = config_path
                    .parent()
                    .filter(|p| !p.as_str().is_empty())
                    .map(|p| p.to_owned())
                    .unwrap_or_else(|| Utf8PathBuf::from("."));
                (config, Some(config_path), working_dir)
            }
            None => {
                debug!("No keel.yaml found, using defaults");
                (DeployerConfig::default(), None, Self::current_dir()?)
            }
        };

        let mut config = apply_env_overrides(config)?;
        resolve_relative_paths(&mut config, &working_dir);

        Ok(Self {
            config,
            config_path,
            working_dir,
        })
    }

    /// Find configuration file in current directory or parent directories
    fn find_config() -> Result<Option<(Utf8PathBuf, String)>> {
        let cwd = Self::current_dir()?;
        let mut current = cwd.as_path();

        loop {
            for name in CONFIG_FILE_NAMES {
                let path = current.join(name);
                if path.exists() {
                    let content = fs::read_to_string(&path)?;
                    return Ok(Some((path, content)));
                }
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }

    fn current_dir() -> Result<Utf8PathBuf> {
        let cwd = env::current_dir().map_err(Error::Io)?;
        Utf8PathBuf::try_from(cwd)
            .map_err(|_| Error::invalid_config("Current directory path is not valid UTF-8"))
    }
}

/// Apply `KEEL_*` environment variable overrides
pub fn apply_env_overrides(mut config: DeployerConfig) -> Result<DeployerConfig> {
    if let Ok(val) = env::var("KEEL_REPOSITORY_DIR") {
        config.repository_dir = Utf8PathBuf::from(val);
    }

    if let Ok(val) = env::var("KEEL_APPS_DIR") {
        config.apps_dir = Utf8PathBuf::from(val);
    }

    if let Ok(val) = env::var("KEEL_EXTRACT_DIR") {
        config.extract_dir = Utf8PathBuf::from(val);
    }

    if let Ok(val) = env::var("KEEL_BUNDLE_EXTENSION") {
        let ext = val.trim_start_matches('.').to_string();
        if ext.is_empty() {
            return Err(Error::invalid_config(
                "KEEL_BUNDLE_EXTENSION must not be empty",
            ));
        }
        config.bundle_extension = ext;
    }

    if let Ok(val) = env::var("KEEL_CATALOG_ENABLED") {
        config.catalog.enabled = val
            .parse()
            .map_err(|_| Error::invalid_config("KEEL_CATALOG_ENABLED must be true or false"))?;
    }

    if let Ok(val) = env::var("KEEL_CATALOG_ENDPOINT") {
        config.catalog.endpoint = Some(val);
    }

    if let Ok(val) = env::var("KEEL_LEDGER_PATH") {
        config.ledger_path = Some(Utf8PathBuf::from(val));
    }

    Ok(config)
}

fn resolve_relative_paths(config: &mut DeployerConfig, base: &Utf8Path) {
    let resolve = |p: &mut Utf8PathBuf| {
        if p.is_relative() {
            *p = base.join(&*p);
        }
    };

    resolve(&mut config.repository_dir);
    resolve(&mut config.apps_dir);
    resolve(&mut config.extract_dir);
    if let Some(ledger) = config.ledger_path.as_mut() {
        resolve(ledger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "KEEL_REPOSITORY_DIR",
            "KEEL_APPS_DIR",
            "KEEL_EXTRACT_DIR",
            "KEEL_BUNDLE_EXTENSION",
            "KEEL_CATALOG_ENABLED",
            "KEEL_CATALOG_ENDPOINT",
            "KEEL_LEDGER_PATH",
        ] {
            env::remove_var(key);
        }
    }

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::try_from(path.to_path_buf()).unwrap()
    }

    #[test]
    #[serial]
    fn test_load_explicit_file_resolves_relative_paths() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let config_path = utf8(dir.path()).join("keel.yaml");
        fs::write(
            &config_path,
            "repository-dir: bundles\nextract-dir: /var/tmp/keel\nbundle-extension: bar\n",
        )
        .unwrap();

        let loaded = KeelConfig::load(Some(&config_path)).unwrap();
        assert_eq!(loaded.config_path.as_ref(), Some(&config_path));
        assert_eq!(
            loaded.config.repository_dir,
            utf8(dir.path()).join("bundles")
        );
        assert_eq!(loaded.config.extract_dir, Utf8PathBuf::from("/var/tmp/keel"));
        assert_eq!(loaded.config.bundle_extension, "bar");
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file() {
        clear_env();
        let err = KeelConfig::load(Some(Utf8Path::new("/nonexistent/keel.yaml"))).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("KEEL_REPOSITORY_DIR", "/srv/bundles");
        env::set_var("KEEL_BUNDLE_EXTENSION", ".pkg");
        env::set_var("KEEL_CATALOG_ENABLED", "true");

        let config = apply_env_overrides(DeployerConfig::default()).unwrap();
        assert_eq!(config.repository_dir, Utf8PathBuf::from("/srv/bundles"));
        assert_eq!(config.bundle_extension, "pkg");
        assert!(config.catalog.enabled);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_override() {
        clear_env();
        env::set_var("KEEL_CATALOG_ENABLED", "sometimes");

        let err = apply_env_overrides(DeployerConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));

        clear_env();
    }
}
