//! Check command - resolve a bundle without running any handler
//!
//! The bundle goes through the regular pipeline with an empty handler
//! chain, so readiness is decided exactly as during a deploy. A package
//! that resolves is undeployed again before the command returns.

use anyhow::{Context, Result};
use camino::Utf8Path;
use keel_deploy::{DeployOutcome, DeploymentOrchestrator};
use owo_colors::OwoColorize;

use crate::cli::CheckArgs;
use crate::output;

pub async fn run(args: CheckArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    // Catalog publishing must not see a dry run
    config.catalog.enabled = false;
    config.ledger_path = None;

    let orchestrator = DeploymentOrchestrator::builder(config).build();
    let bundle = args.bundle.as_std_path();

    let outcome = orchestrator
        .deploy(bundle)
        .await
        .with_context(|| format!("Failed to check {}", args.bundle))?;

    match &outcome {
        DeployOutcome::Deployed { id } => {
            let package = orchestrator.registry().find(id);
            output::success(&format!("{} resolves", id));
            if let Some(package) = package {
                let store = package.artifacts();
                for artifact_id in package.deployable_artifacts() {
                    if let Some(artifact) = store.get(artifact_id) {
                        println!("  {} {}", "•".green(), artifact.name_with_version());
                    }
                }
            }
            orchestrator.undeploy(bundle).await?;
        }
        DeployOutcome::NotReady { id, missing } => {
            output::error(&format!("{} is not ready", id));
            for dep in missing {
                println!("  {} {}", "✗".red(), dep);
            }
        }
        DeployOutcome::Skipped { bundle_name, reason } => {
            output::info(&format!("{} skipped: {:?}", bundle_name, reason));
        }
        DeployOutcome::Faulty { .. } => {
            // No handlers run during a check
            output::error(&format!("{} failed unexpectedly", args.bundle));
        }
    }

    orchestrator.shutdown().await;
    if matches!(outcome, DeployOutcome::NotReady { .. } | DeployOutcome::Faulty { .. }) {
        anyhow::bail!("{} has unresolved dependencies", args.bundle);
    }
    Ok(())
}
