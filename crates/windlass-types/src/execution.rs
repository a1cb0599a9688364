//! Execution tracking types.
//!
//! An [`Execution`] is one run of a pinned workflow definition against a
//! specific input. Step-level attempts are recorded append-only as
//! [`StepResult`] rows; terminal failures land in the dead-letter queue as
//! [`DlqEntry`] rows. [`ExecutionPatch`] is the partial-update value accepted
//! by the store, distinguishing "leave unchanged" from "set to NULL" for
//! nullable columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

/// Lifecycle status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    RetryScheduled,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Terminal statuses are never left once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Stable string form used in persistence and the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::RetryScheduled => "retry_scheduled",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "retry_scheduled" => Some(Self::RetryScheduled),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Outcome of a single step attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResultStatus {
    Completed,
    Failed,
}

impl StepResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// One run of a workflow definition against a specific input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// UUIDv7 execution ID.
    pub id: Uuid,
    /// Name of the pinned workflow definition.
    pub workflow_name: String,
    /// Version of the pinned workflow definition.
    pub workflow_version: String,
    /// Current lifecycle status.
    pub status: ExecutionStatus,
    /// Trigger input payload.
    pub input: Value,
    /// Accumulated state snapshot (step_id -> output), written after each step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Last error message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Step to resume at after a claim (the crash-safety checkpoint).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<String>,
    /// Retry count for the current step; reset to 0 on step success.
    pub retry_count: u32,
    /// Present iff status is `retry_scheduled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Owning worker while claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    /// When the current claim was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    /// Caller-supplied deduplication key, unique across executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    /// First time the execution was claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Set exactly once, when a terminal status is reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a pending execution.
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub workflow_name: String,
    pub workflow_version: String,
    pub input: Value,
    pub idempotency_key: Option<String>,
}

// ---------------------------------------------------------------------------
// ExecutionPatch
// ---------------------------------------------------------------------------

/// Partial update of an execution's mutable fields.
///
/// Outer `None` leaves a field unchanged. For nullable columns the inner
/// `Option` carries the new value, so `Some(None)` explicitly clears.
/// Last-writer-wins; the store exposes no CAS because a claimed execution
/// has a single owning runner.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPatch {
    pub status: Option<ExecutionStatus>,
    pub output: Option<Value>,
    pub error: Option<Option<String>>,
    pub current_step_id: Option<Option<String>>,
    pub retry_count: Option<u32>,
    pub next_retry_at: Option<Option<DateTime<Utc>>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub worker_id: Option<Option<String>>,
    pub locked_at: Option<Option<DateTime<Utc>>>,
}

impl ExecutionPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.output.is_none()
            && self.error.is_none()
            && self.current_step_id.is_none()
            && self.retry_count.is_none()
            && self.next_retry_at.is_none()
            && self.started_at.is_none()
            && self.completed_at.is_none()
            && self.worker_id.is_none()
            && self.locked_at.is_none()
    }

    pub fn status(mut self, status: ExecutionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    pub fn current_step(mut self, step_id: impl Into<String>) -> Self {
        self.current_step_id = Some(Some(step_id.into()));
        self
    }

    pub fn clear_current_step(mut self) -> Self {
        self.current_step_id = Some(None);
        self
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    pub fn next_retry_at(mut self, at: DateTime<Utc>) -> Self {
        self.next_retry_at = Some(Some(at));
        self
    }

    pub fn clear_next_retry(mut self) -> Self {
        self.next_retry_at = Some(None);
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    /// Clear worker ownership, as required when reaching a terminal status.
    pub fn release_worker(mut self) -> Self {
        self.worker_id = Some(None);
        self.locked_at = Some(None);
        self
    }
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Durable record of one attempt of one step. Append-only; attempts are
/// numbered 1-based and strictly increase per (execution, step).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// UUIDv7 row ID.
    pub id: Uuid,
    pub execution_id: Uuid,
    pub step_id: String,
    pub status: StepResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 1-based attempt number for this step.
    pub attempt: u32,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Dead-letter queue
// ---------------------------------------------------------------------------

/// Append-only record of a terminally failed execution, with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// UUIDv7 entry ID.
    pub id: Uuid,
    pub execution_id: Uuid,
    pub workflow_name: String,
    pub workflow_version: String,
    /// Why the execution terminated (e.g. retry budget exhausted).
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Total attempts of the step that exhausted the budget.
    pub total_attempts: u32,
    /// Original trigger input, for replay.
    pub input: Value,
    /// The last step the execution reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_step_id: Option<String>,
    pub failed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Execution logs
// ---------------------------------------------------------------------------

/// A log line collected during execution (from the `log` handler or runner
/// lifecycle notices).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// UUIDv7 row ID.
    pub id: Uuid,
    pub execution_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Log level string ("debug", "info", "warn", "error").
    pub level: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Filter for operator-facing execution listings (not used by the hot path).
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionFilter {
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
    #[serde(default)]
    pub workflow_name: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: u32,
}

fn default_list_limit() -> u32 {
    50
}

impl Default for ExecutionFilter {
    fn default() -> Self {
        Self {
            status: None,
            workflow_name: None,
            limit: default_list_limit(),
        }
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The execution was marked cancelled.
    Cancelled,
    /// The execution was already in a terminal state.
    Conflict,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
