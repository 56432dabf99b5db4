//! Order command - show how repository bundles will be sequenced

use anyhow::{Context, Result};
use camino::Utf8Path;
use keel_deploy::ProcessingOrderResolver;
use owo_colors::OwoColorize;

use crate::cli::OrderArgs;
use crate::output;

pub fn run(args: OrderArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let resolver = ProcessingOrderResolver::from_config(&config);

    let census = resolver
        .census()
        .with_context(|| format!("Failed to read repository {}", config.repository_dir))?;
    let order = resolver
        .repository_order()
        .with_context(|| format!("Failed to read repository {}", config.repository_dir))?;
    let names: Vec<String> = order
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();

    if args.json {
        let json = serde_json::json!({
            "repository": config.repository_dir,
            "ordered_by_descriptors": census.is_complete(),
            "bundles": names,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if names.is_empty() {
        output::info(&format!("No bundles in {}", config.repository_dir));
        return Ok(());
    }

    if census.is_complete() {
        output::info("Ordered by bundle descriptors");
    } else if !census.described.is_empty() || !census.errors.is_empty() {
        for error in &census.errors {
            output::warning(&error.to_string());
        }
        if !census.missing.is_empty() {
            output::warning(&format!(
                "No descriptor in {}; using lexical order",
                census.missing.join(", ")
            ));
        }
    } else {
        output::info("No bundle descriptors; using lexical order");
    }

    for (position, name) in names.iter().enumerate() {
        println!("{:>4}  {}", (position + 1).dimmed(), name);
    }
    Ok(())
}
