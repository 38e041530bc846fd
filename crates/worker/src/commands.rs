//! `list` and `run` implementations.

use std::path::Path;

use core_flows::{Fixtures, InMemoryModules};
use serde_json::Value;
use workflows_sdk::{CancellationToken, Registry, TransactionOrchestrator, WorkflowResult};

use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::{Result, WorkerError};

/// Builds the registry with every core step and workflow.
pub fn build_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    core_flows::register_all(&mut registry)?;
    Ok(registry)
}

/// Renders the registered workflows and steps.
pub fn list(registry: &Registry) -> String {
    let mut out = String::from("Workflows:\n");
    for id in registry.workflow_ids() {
        if let Ok(definition) = registry.workflow(id) {
            out.push_str(&format!(
                "  {id}: {}\n",
                definition.step_names().join(", ")
            ));
        }
    }

    out.push_str("Steps:\n");
    for id in registry.step_ids() {
        let compensable = registry
            .step_info(id)
            .map(|info| info.has_compensation)
            .unwrap_or(false);
        if compensable {
            out.push_str(&format!("  {id} (compensable)\n"));
        } else {
            out.push_str(&format!("  {id}\n"));
        }
    }
    out
}

/// Runs one workflow against freshly seeded in-memory modules.
pub async fn run(
    registry: &Registry,
    config: &Config,
    args: &RunArgs,
    cancel: CancellationToken,
) -> Result<WorkflowResult> {
    let definition = registry.workflow(&args.workflow_id)?;
    let input: Value = serde_json::from_str(&args.input).map_err(WorkerError::InvalidInput)?;

    let modules = InMemoryModules::new();
    if let Some(path) = &args.fixtures {
        modules.seed(load_fixtures(path).await?).await;
    }

    let mut orchestrator_config = config.orchestrator.clone();
    if let Some(max_concurrency) = args.max_concurrency {
        orchestrator_config = orchestrator_config.with_max_concurrency(max_concurrency);
    }

    let orchestrator = TransactionOrchestrator::new(definition)
        .with_config(orchestrator_config)
        .with_container(modules.container());

    tracing::info!(workflow_id = %args.workflow_id, "Running workflow");
    Ok(orchestrator.run_with_cancellation(input, cancel).await)
}

async fn load_fixtures(path: &Path) -> Result<Fixtures> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| WorkerError::FixturesIo {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&raw).map_err(|source| WorkerError::InvalidFixtures {
        path: path.to_path_buf(),
        source,
    })
}

/// Cancels the token on SIGINT.
pub async fn cancel_on_ctrl_c(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("received SIGINT, cancelling workflow");
            token.cancel();
        }
        Err(error) => tracing::warn!(%error, "failed to install SIGINT handler"),
    }
}
