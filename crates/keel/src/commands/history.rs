//! History command - read the deployment event ledger

use anyhow::{Context, Result};
use camino::Utf8Path;
use keel_deploy::ledger::{DeploymentLedger, EventFilter};
use owo_colors::OwoColorize;

use crate::cli::HistoryArgs;
use crate::output;

pub fn run(args: HistoryArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let Some(ledger_path) = config.ledger_path else {
        anyhow::bail!("No ledger configured; set ledger-path in keel.yaml");
    };
    let ledger = DeploymentLedger::new(ledger_path.as_std_path());

    if args.states {
        let states = ledger
            .latest_states()
            .context("Failed to read deployment ledger")?;
        if states.is_empty() {
            output::info("No deployments recorded");
            return Ok(());
        }
        output::header("Package States");
        let mut states: Vec<_> = states.into_values().collect();
        states.sort_by(|a, b| a.package_name.cmp(&b.package_name));
        for status in states {
            output::kv(
                &status.package_name,
                &format!(
                    "{:?} ({})",
                    status.current_state,
                    status.last_event_time.format("%Y-%m-%d %H:%M:%S UTC")
                ),
            );
        }
        return Ok(());
    }

    let filter = EventFilter {
        package_name: args.package,
        event_types: (!args.event_types.is_empty()).then_some(args.event_types),
        since: None,
        limit: args.limit,
    };
    let events = ledger
        .history(&filter)
        .context("Failed to read deployment ledger")?;

    if events.is_empty() {
        output::info("No matching events");
        return Ok(());
    }
    for event in events {
        println!(
            "{}  {:<18} {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S").dimmed(),
            event.event.type_name().bold(),
            event.package_name
        );
    }
    Ok(())
}
