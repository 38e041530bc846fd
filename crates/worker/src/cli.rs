//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "worker", version, about = "Runs registered workflows")]
pub struct Cli {
    /// Log at debug level, overriding RUST_LOG.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List registered workflows and steps.
    List,
    /// Run one workflow and print its result as JSON.
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Workflow id, as shown by `list`.
    pub workflow_id: String,

    /// Workflow input as JSON.
    #[arg(long, default_value = "{}")]
    pub input: String,

    /// JSON file seeding the in-memory module services.
    #[arg(long)]
    pub fixtures: Option<PathBuf>,

    /// Print a Prometheus snapshot after the run.
    #[arg(long)]
    pub metrics: bool,

    /// Overrides WORKFLOW_MAX_CONCURRENCY.
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}
