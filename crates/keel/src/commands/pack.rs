//! Pack command - build a bundle archive from an extracted layout

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use keel_core::types::ROOT_DESCRIPTOR_FILE;

use crate::cli::PackArgs;
use crate::output;

pub fn run(args: PackArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = super::load_config(config_path)?;

    if !args.source.join(ROOT_DESCRIPTOR_FILE).is_file() {
        anyhow::bail!(
            "{} is not a bundle directory: {} not found",
            args.source,
            ROOT_DESCRIPTOR_FILE
        );
    }

    let output_path = match args.output {
        Some(path) => path,
        None => default_output(&args.source, &config.repository_dir, &config.bundle_extension)
            .context("Cannot derive a bundle name from the source path")?,
    };
    if !config.is_bundle_file_name(output_path.file_name().unwrap_or_default()) {
        output::warning(&format!(
            "{} does not end in .{} and will not be picked up by deploy",
            output_path, config.bundle_extension
        ));
    }

    keel_deploy::pack_bundle(args.source.as_std_path(), output_path.as_std_path())
        .with_context(|| format!("Failed to pack {}", args.source))?;

    output::success(&format!("Packed {} into {}", args.source, output_path));
    Ok(())
}

/// `<repository>/<source dir name>.<extension>`
fn default_output(source: &Utf8Path, repository: &Utf8Path, extension: &str) -> Option<Utf8PathBuf> {
    source
        .file_name()
        .map(|name| repository.join(format!("{}.{}", name, extension)))
}
