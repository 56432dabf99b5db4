//! Keel CLI - Composite bundle deployment orchestrator
//!
//! This is the main entry point for the Keel command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Deploy(args) => commands::deploy::run(args, config).await,
        Commands::Check(args) => commands::check::run(args, config).await,
        Commands::Order(args) => commands::order::run(args, config),
        Commands::Pack(args) => commands::pack::run(args, config),
        Commands::History(args) => commands::history::run(args, config),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // Info shows per-bundle deployment progress
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
