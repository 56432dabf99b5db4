//! Bundle archives: gzip-compressed tar files
//!
//! Bundles are packed with entries relative to the bundle root. Archives
//! produced by other tools often prefix entries with `./`, so lookups
//! compare normalized paths.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};
use tracing::debug;

/// Unpacks a bundle into a fresh directory under an extraction root
pub trait BundleExtractor: Send + Sync {
    /// Extract `bundle` below `extraction_root` and return the new directory
    fn extract(&self, bundle: &Path, extraction_root: &Path) -> Result<PathBuf>;
}

/// Extractor for gzip-compressed tar bundles
#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzExtractor;

impl TarGzExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl BundleExtractor for TarGzExtractor {
    fn extract(&self, bundle: &Path, extraction_root: &Path) -> Result<PathBuf> {
        let stem = bundle
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle".to_string());
        let target = extraction_root.join(format!("{}-{}", stem, uuid::Uuid::new_v4()));

        fs::create_dir_all(&target)
            .with_context(|| format!("Failed to create {}", target.display()))?;

        if let Err(e) = unpack(bundle, &target) {
            let _ = fs::remove_dir_all(&target);
            return Err(e);
        }

        debug!("Extracted {} to {}", bundle.display(), target.display());
        Ok(target)
    }
}

fn unpack(bundle: &Path, target: &Path) -> Result<()> {
    let file =
        File::open(bundle).with_context(|| format!("Failed to open bundle {}", bundle.display()))?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);
    archive
        .unpack(target)
        .with_context(|| format!("Failed to unpack {}", bundle.display()))?;
    Ok(())
}

/// Pack an extracted bundle layout at `source_dir` into `output`
pub fn pack_bundle(source_dir: &Path, output: &Path) -> Result<()> {
    if !source_dir.is_dir() {
        anyhow::bail!("{} is not a directory", source_dir.display());
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let file =
        File::create(output).with_context(|| format!("Failed to create {}", output.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    let mut entries = fs::read_dir(source_dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let appended = if entry.file_type()?.is_dir() {
            builder.append_dir_all(&name, &path)
        } else {
            builder.append_path_with_name(&path, &name)
        };
        appended.with_context(|| format!("Failed to pack {}", path.display()))?;
    }

    let mut encoder = builder.into_inner()?;
    encoder.flush()?;
    encoder.finish()?;

    debug!("Packed {} into {}", source_dir.display(), output.display());
    Ok(())
}

/// Read one file from a bundle without unpacking it. `Ok(None)` when the
/// bundle has no such entry.
pub fn read_entry(bundle: &Path, entry_path: &str) -> Result<Option<String>> {
    let wanted = normalize(Path::new(entry_path));
    let file =
        File::open(bundle).with_context(|| format!("Failed to open bundle {}", bundle.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive.entries()? {
        let mut entry = entry?;
        if normalize(&entry.path()?) != wanted {
            continue;
        }
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .with_context(|| format!("Failed to read {} from {}", entry_path, bundle.display()))?;
        return Ok(Some(content));
    }

    Ok(None)
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
