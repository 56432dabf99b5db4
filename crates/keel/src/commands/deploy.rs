//! Deploy command - run every pending bundle through the orchestrator

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use camino::Utf8Path;
use keel_deploy::{
    DeployOutcome, DeployResult, DeploymentOrchestrator, HandlerChain, ProcessingOrderResolver,
    SkipReason, StagingHandler,
};
use owo_colors::OwoColorize;

use crate::cli::DeployArgs;
use crate::output;

pub async fn run(args: DeployArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = super::load_config(config_path)?;

    let handlers = HandlerChain::builder()
        .register(StagingHandler::new(args.target.as_std_path()))
        .build();
    let orchestrator = DeploymentOrchestrator::builder(config.clone())
        .handlers(handlers)
        .build();
    orchestrator
        .init()
        .context("Failed to prepare extraction directory")?;

    let pending: Vec<PathBuf> = if args.bundles.is_empty() {
        ProcessingOrderResolver::from_config(&config)
            .repository_order()
            .with_context(|| format!("Failed to read repository {}", config.repository_dir))?
    } else {
        let mut explicit: Vec<PathBuf> = args
            .bundles
            .iter()
            .map(|b| b.as_std_path().to_path_buf())
            .collect();
        let len = explicit.len();
        orchestrator.sort(&mut explicit, 0, len);
        explicit
    };

    let mut summary = Summary::default();
    for bundle in &pending {
        let result = orchestrator.deploy(bundle).await;
        summary.record(bundle, result);
    }

    if args.bundles.is_empty() && !args.skip_apps {
        let results = orchestrator
            .deploy_apps_directory()
            .await
            .with_context(|| format!("Failed to read apps directory {}", config.apps_dir))?;
        for (dir, result) in results {
            summary.record(&dir, result);
        }
    }

    orchestrator.shutdown().await;
    summary.print();

    if summary.failed > 0 {
        anyhow::bail!("{} bundle(s) failed to deploy", summary.failed);
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Summary {
    deployed: usize,
    skipped: usize,
    not_ready: usize,
    failed: usize,
}

impl Summary {
    fn record(&mut self, bundle: &Path, result: DeployResult<DeployOutcome>) {
        let name = bundle.display();
        match result {
            Ok(DeployOutcome::Deployed { id }) => {
                self.deployed += 1;
                output::success(&format!("{} deployed from {}", id, name));
            }
            Ok(DeployOutcome::Skipped { reason, .. }) => {
                self.skipped += 1;
                let why = match reason {
                    SkipReason::NotABundle => "not a bundle",
                    SkipReason::NoDependencies => "no dependencies",
                };
                output::info(&format!("{} skipped: {}", name, why));
            }
            Ok(DeployOutcome::NotReady { id, missing }) => {
                self.not_ready += 1;
                output::warning(&format!("{} is not ready, missing {}", id, missing.join(", ")));
            }
            Ok(DeployOutcome::Faulty { id, failure }) => {
                self.failed += 1;
                output::error(&format!("{} rolled back: {}", id, failure));
            }
            Err(e) => {
                self.failed += 1;
                output::error(&format!("{}: {}", name, e));
            }
        }
    }

    fn print(&self) {
        output::header("Deployment Summary");
        output::kv("Deployed", &self.deployed.green().to_string());
        output::kv("Not ready", &self.not_ready.yellow().to_string());
        output::kv("Failed", &self.failed.red().to_string());
        output::kv("Skipped", &self.skipped.dimmed().to_string());
    }
}
