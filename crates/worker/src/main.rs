//! Worker entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::{Cli, Config};

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_env();

    let directive = if cli.debug { "debug" } else { config.log_level.as_str() };
    init_tracing(directive);

    match worker::execute(cli, config).await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(%error, "worker failed");
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}
