//! Pinned workflow definition types.
//!
//! The execution subsystem consumes definitions that are already validated
//! and version-pinned by the authoring layer: step ids are unique within a
//! definition, `next`/`on_error` references resolve, and there is at least
//! one step. The first step in the list is the entry point.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// PinnedDefinition
// ---------------------------------------------------------------------------

/// A validated, version-pinned workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinnedDefinition {
    /// Workflow name (the trigger key).
    pub name: String,
    /// Semantic version string pinned at trigger time.
    pub version: String,
    /// Ordered, non-empty list of steps. The first step is the entry point.
    pub steps: Vec<StepDefinition>,
}

impl PinnedDefinition {
    /// The entry-point step.
    pub fn entry_step(&self) -> Option<&StepDefinition> {
        self.steps.first()
    }

    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }
}

// ---------------------------------------------------------------------------
// StepDefinition
// ---------------------------------------------------------------------------

/// A single node in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step id, unique within the definition.
    pub id: String,
    /// Handler type tag (e.g. "log", "http", "transform").
    #[serde(rename = "type")]
    pub step_type: String,
    /// Handler-specific configuration payload.
    #[serde(default)]
    pub config: Value,
    /// Successor step id; `None` means the workflow ends here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// Alternate successor on non-retryable failure. Carried in the model
    /// but not consulted by the retry-exhausted path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<String>,
    /// Step-level timeout override in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Retry policy for this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Bounded exponential backoff policy for a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts including the first (default 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay before the first retry, in milliseconds (default 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Exponential growth factor (default 2).
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Cap on any single delay, in milliseconds (default 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
