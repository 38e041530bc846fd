//! Command-line runner for the core workflows.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

use std::process::ExitCode;

use metrics_exporter_prometheus::PrometheusBuilder;
use workflows_sdk::CancellationToken;

pub use cli::{Cli, Command, RunArgs};
pub use config::Config;
pub use error::{Result, WorkerError};

/// Exit code for a run that ended compensated or compensation-failed.
pub const EXIT_WORKFLOW_FAILED: u8 = 2;

/// Executes a parsed command.
///
/// The run result goes to stdout as JSON; logs and the optional metrics
/// snapshot go to stderr.
pub async fn execute(cli: Cli, config: Config) -> Result<ExitCode> {
    let registry = commands::build_registry()?;

    match cli.command {
        Command::List => {
            print!("{}", commands::list(&registry));
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => {
            let metrics = if args.metrics {
                Some(PrometheusBuilder::new().install_recorder()?)
            } else {
                None
            };

            let cancel = CancellationToken::new();
            let watcher = tokio::spawn(commands::cancel_on_ctrl_c(cancel.clone()));
            let result = commands::run(&registry, &config, &args, cancel).await;
            watcher.abort();
            let result = result?;

            println!("{}", serde_json::to_string_pretty(&result)?);
            if let Some(handle) = metrics {
                eprintln!("{}", handle.render());
            }

            if result.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_WORKFLOW_FAILED))
            }
        }
    }
}
