//! Orchestrator configuration loaded from environment variables.

use std::time::Duration;

use crate::step::RetryPolicy;

/// Execution limits and step defaults.
///
/// Reads from environment variables:
/// - `WORKFLOW_MAX_CONCURRENCY`: steps in flight per execution (default: `16`)
/// - `WORKFLOW_DEFAULT_MAX_ATTEMPTS`: attempts for steps without a policy (default: `1`)
/// - `WORKFLOW_DEFAULT_BACKOFF_MS`: delay between those attempts (default: `0`)
/// - `WORKFLOW_STEP_TIMEOUT_MS`: per-attempt deadline (default: none)
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub max_concurrency: usize,
    pub default_retry: RetryPolicy,
    pub default_step_timeout: Option<Duration>,
}

impl OrchestratorConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_u64 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let defaults = Self::default();

        let max_concurrency = parse_u64("WORKFLOW_MAX_CONCURRENCY")
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_concurrency);

        let max_attempts = parse_u64("WORKFLOW_DEFAULT_MAX_ATTEMPTS")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(defaults.default_retry.max_attempts);

        let mut default_retry = RetryPolicy::attempts(max_attempts);
        if let Some(backoff) = parse_u64("WORKFLOW_DEFAULT_BACKOFF_MS") {
            default_retry = default_retry.with_backoff(Duration::from_millis(backoff));
        }

        Self {
            max_concurrency,
            default_retry,
            default_step_timeout: parse_u64("WORKFLOW_STEP_TIMEOUT_MS").map(Duration::from_millis),
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    pub fn with_default_step_timeout(mut self, timeout: Duration) -> Self {
        self.default_step_timeout = Some(timeout);
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            default_retry: RetryPolicy::none(),
            default_step_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrency, 16);
        assert_eq!(config.default_retry, RetryPolicy::none());
        assert_eq!(config.default_step_timeout, None);
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(
            OrchestratorConfig::from_lookup(lookup(&[])),
            OrchestratorConfig::default()
        );
    }

    #[test]
    fn test_values_from_lookup() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            ("WORKFLOW_MAX_CONCURRENCY", "4"),
            ("WORKFLOW_DEFAULT_MAX_ATTEMPTS", "3"),
            ("WORKFLOW_DEFAULT_BACKOFF_MS", "25"),
            ("WORKFLOW_STEP_TIMEOUT_MS", "500"),
        ]));

        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.default_retry.max_attempts, 3);
        assert_eq!(config.default_retry.initial_backoff, Duration::from_millis(25));
        assert_eq!(config.default_step_timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            ("WORKFLOW_MAX_CONCURRENCY", "zero"),
            ("WORKFLOW_STEP_TIMEOUT_MS", "-1"),
        ]));

        assert_eq!(config.max_concurrency, 16);
        assert_eq!(config.default_step_timeout, None);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let config = OrchestratorConfig::from_lookup(lookup(&[("WORKFLOW_MAX_CONCURRENCY", "0")]));
        assert_eq!(config.max_concurrency, 16);
        assert_eq!(OrchestratorConfig::default().with_max_concurrency(0).max_concurrency, 1);
    }
}
