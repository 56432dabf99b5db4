//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Keel - Composite bundle deployment orchestrator
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to keel.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy bundles from the repository and apps directories
    Deploy(DeployArgs),

    /// Check whether a bundle's dependencies resolve, without deploying it
    Check(CheckArgs),

    /// Show the order repository bundles would be processed in
    Order(OrderArgs),

    /// Pack a bundle directory into a bundle archive
    Pack(PackArgs),

    /// Show recorded deployment events
    History(HistoryArgs),
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Bundle files or directories to deploy (default: the whole repository)
    pub bundles: Vec<Utf8PathBuf>,

    /// Directory deployed artifacts are staged into
    #[arg(short, long, default_value = "deployed")]
    pub target: Utf8PathBuf,

    /// Skip the apps directory
    #[arg(long)]
    pub skip_apps: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Bundle file or directory to check
    pub bundle: Utf8PathBuf,
}

#[derive(Args, Debug)]
pub struct OrderArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PackArgs {
    /// Extracted bundle directory
    pub source: Utf8PathBuf,

    /// Output bundle file
    #[arg(short, long)]
    pub output: Option<Utf8PathBuf>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Only events for this package
    #[arg(short, long)]
    pub package: Option<String>,

    /// Only events of these types (e.g. deploy_failed)
    #[arg(short = 't', long = "type")]
    pub event_types: Vec<String>,

    /// Show at most this many of the latest events
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Show the latest state of each package instead of events
    #[arg(long)]
    pub states: bool,
}
