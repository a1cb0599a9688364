//! Orchestrator configuration.
//!
//! Deserialized from `config.toml` in the data directory by the infra
//! loader; every field has a default so a missing or partial file still
//! yields a working configuration.

use serde::{Deserialize, Serialize};

use crate::definition::RetryPolicy;

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for workers, retry defaults, step execution and
/// the claim sweeper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub retry: RetryDefaults,
    #[serde(default)]
    pub step: StepDefaults,
    #[serde(default)]
    pub claim: ClaimConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Worker pool tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum in-flight executions per worker.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Gap between claim attempts, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bound on the graceful-shutdown drain, in milliseconds.
    #[serde(default = "default_stop_deadline_ms")]
    pub stop_deadline_ms: u64,
}

fn default_concurrency() -> usize {
    3
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_stop_deadline_ms() -> u64 {
    30_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
            stop_deadline_ms: default_stop_deadline_ms(),
        }
    }
}

/// Fallbacks applied when a step omits its retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryDefaults {
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub default_base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub default_max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            default_max_attempts: default_max_attempts(),
            default_base_delay_ms: default_base_delay_ms(),
            default_max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryDefaults {
    /// The policy applied to a step that declares none.
    pub fn as_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.default_max_attempts,
            base_delay_ms: self.default_base_delay_ms,
            backoff_multiplier: 2.0,
            max_delay_ms: self.default_max_delay_ms,
        }
    }

    /// Fill the gaps of a step-level policy, preferring its own values.
    pub fn resolve(&self, step_policy: Option<&RetryPolicy>) -> RetryPolicy {
        step_policy.copied().unwrap_or_else(|| self.as_policy())
    }
}

/// Step-interpreter defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefaults {
    /// Fallback when a step omits `timeout_ms`.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    60_000
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Stale-claim sweeper tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimConfig {
    /// Age in minutes at which a claim is considered stale and released.
    #[serde(default = "default_stale_lock_threshold_min")]
    pub stale_lock_threshold_min: u64,
    /// Interval between sweeper passes, in milliseconds.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_stale_lock_threshold_min() -> u64 {
    30
}

fn default_sweep_interval_ms() -> u64 {
    60_000
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            stale_lock_threshold_min: default_stale_lock_threshold_min(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// REST surface binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8320".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.worker.concurrency, 3);
        assert_eq!(config.worker.poll_interval_ms, 1000);
        assert_eq!(config.retry.default_max_attempts, 3);
        assert_eq!(config.retry.default_base_delay_ms, 1000);
        assert_eq!(config.retry.default_max_delay_ms, 30_000);
        assert_eq!(config.step.default_timeout_ms, 60_000);
        assert_eq!(config.claim.stale_lock_threshold_min, 30);
    }

    #[test]
    fn test_retry_defaults_as_policy() {
        let defaults = RetryDefaults::default();
        let policy = defaults.as_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_resolve_prefers_step_policy() {
        use crate::definition::RetryPolicy;

        let defaults = RetryDefaults::default();
        let step_policy = RetryPolicy {
            max_attempts: 7,
            base_delay_ms: 10,
            backoff_multiplier: 3.0,
            max_delay_ms: 500,
        };
        assert_eq!(defaults.resolve(Some(&step_policy)).max_attempts, 7);
        assert_eq!(defaults.resolve(None).max_attempts, 3);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let parsed: OrchestratorConfig =
            serde_json::from_str(r#"{"worker": {"concurrency": 8}}"#).unwrap();
        assert_eq!(parsed.worker.concurrency, 8);
        assert_eq!(parsed.worker.poll_interval_ms, 1000);
        assert_eq!(parsed.step.default_timeout_ms, 60_000);
    }
}
