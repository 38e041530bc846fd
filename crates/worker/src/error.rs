//! Worker error types.

use std::path::PathBuf;

use thiserror::Error;
use workflows_sdk::RegistryError;

/// Errors that stop the worker before or around a workflow run.
///
/// Step failures are not errors here; they are reported in the run result.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The requested workflow is not registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The engine rejected the core steps or workflows at startup.
    #[error(transparent)]
    Engine(#[from] workflows_sdk::Error),

    /// `--input` is not valid JSON.
    #[error("Invalid workflow input: {0}")]
    InvalidInput(#[source] serde_json::Error),

    /// The fixtures file could not be read.
    #[error("Failed to read fixtures from {}: {source}", path.display())]
    FixturesIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The fixtures file is not valid.
    #[error("Invalid fixtures in {}: {source}", path.display())]
    InvalidFixtures {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The Prometheus recorder could not be installed.
    #[error("Failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// The run result could not be rendered.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for worker results.
pub type Result<T> = std::result::Result<T, WorkerError>;
