//! Worker configuration loaded from environment variables.

use workflows_sdk::OrchestratorConfig;

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - the `WORKFLOW_*` variables read by [`OrchestratorConfig::from_env`]
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: String,
    pub orchestrator: OrchestratorConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            orchestrator: OrchestratorConfig::from_lookup(lookup),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}
