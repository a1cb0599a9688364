//! Step interpreter: executes a single step with timeout and handler
//! dispatch, returning a pure outcome.
//!
//! The interpreter does not retry, does not persist, and does not know about
//! the store; its only side effects flow through the handler it dispatches
//! to. The runner turns outcomes into step results and state transitions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::Value;
use uuid::Uuid;
use windlass_types::definition::StepDefinition;
use windlass_types::execution::{StepResult, StepResultStatus};

use crate::context::StepContext;
use crate::handler::HandlerRegistry;

// ---------------------------------------------------------------------------
// StepOutcome
// ---------------------------------------------------------------------------

/// The pure result of interpreting one step attempt.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub status: StepResultStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    /// Successor chosen by the handler; `None` ends the workflow.
    pub next: Option<String>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == StepResultStatus::Completed
    }

    /// Materialize this outcome as a durable step-result row.
    pub fn to_step_result(&self, execution_id: Uuid, step_id: &str, attempt: u32) -> StepResult {
        StepResult {
            id: Uuid::now_v7(),
            execution_id,
            step_id: step_id.to_string(),
            status: self.status,
            output: self.output.clone(),
            error: self.error.clone(),
            attempt,
            duration_ms: self.duration_ms,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// StepInterpreter
// ---------------------------------------------------------------------------

/// Executes single steps against the handler registry.
pub struct StepInterpreter {
    registry: Arc<HandlerRegistry>,
    default_timeout_ms: u64,
}

impl StepInterpreter {
    pub fn new(registry: Arc<HandlerRegistry>, default_timeout_ms: u64) -> Self {
        Self {
            registry,
            default_timeout_ms,
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Execute one step attempt.
    ///
    /// The timeout race abandons the handler's in-flight work rather than
    /// killing it; handlers holding external resources must set their own
    /// deadlines.
    pub async fn execute_step(&self, step: &StepDefinition, ctx: &StepContext) -> StepOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();
        let timeout_ms = step.timeout_ms.unwrap_or(self.default_timeout_ms);

        // Failure injection for chaos testing: a `failureRate` field in the
        // step config fails the attempt with that probability.
        if let Some(rate) = step.config.get("failureRate").and_then(Value::as_f64) {
            let rate = rate.clamp(0.0, 1.0);
            if rate > 0.0 && rand::thread_rng().r#gen::<f64>() < rate {
                return Self::finish(
                    started_at,
                    clock,
                    StepResultStatus::Failed,
                    None,
                    Some("Simulated random failure".to_string()),
                    None,
                );
            }
        }

        let Some(handler) = self.registry.get(&step.step_type) else {
            return Self::finish(
                started_at,
                clock,
                StepResultStatus::Failed,
                None,
                Some(format!("Unknown step type: {}", step.step_type)),
                None,
            );
        };

        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            handler.execute(step, ctx),
        )
        .await
        {
            Ok(Ok(handler_output)) => Self::finish(
                started_at,
                clock,
                StepResultStatus::Completed,
                Some(handler_output.output),
                None,
                handler_output.next,
            ),
            Ok(Err(err)) => Self::finish(
                started_at,
                clock,
                StepResultStatus::Failed,
                None,
                Some(err.to_string()),
                None,
            ),
            Err(_elapsed) => Self::finish(
                started_at,
                clock,
                StepResultStatus::Failed,
                None,
                Some(format!("Step timed out after {timeout_ms}ms")),
                None,
            ),
        }
    }

    fn finish(
        started_at: DateTime<Utc>,
        clock: Instant,
        status: StepResultStatus,
        output: Option<Value>,
        error: Option<String>,
        next: Option<String>,
    ) -> StepOutcome {
        StepOutcome {
            status,
            output,
            error,
            next,
            duration_ms: clock.elapsed().as_millis() as u64,
            started_at,
            completed_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn interpreter() -> StepInterpreter {
        StepInterpreter::new(Arc::new(HandlerRegistry::with_builtins()), 60_000)
    }

    fn ctx() -> StepContext {
        StepContext::new(Uuid::now_v7(), Map::new())
    }

    fn step(step_type: &str, config: Value, timeout_ms: Option<u64>) -> StepDefinition {
        StepDefinition {
            id: "s1".to_string(),
            step_type: step_type.to_string(),
            config,
            next: Some("s2".to_string()),
            on_error: None,
            timeout_ms,
            retry: None,
        }
    }

    #[tokio::test]
    async fn test_completed_step_carries_output_and_next() {
        let outcome = interpreter()
            .execute_step(&step("log", json!({"message": "hi"}), None), &ctx())
            .await;
        assert!(outcome.is_completed());
        assert_eq!(outcome.output, Some(json!({"logged": true})));
        assert_eq!(outcome.next.as_deref(), Some("s2"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_unknown_step_type_fails() {
        let outcome = interpreter()
            .execute_step(&step("teleport", json!({}), None), &ctx())
            .await;
        assert_eq!(outcome.status, StepResultStatus::Failed);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Unknown step type: teleport")
        );
        assert!(outcome.next.is_none());
    }

    #[tokio::test]
    async fn test_timeout_beats_slow_delay() {
        let start = Instant::now();
        let outcome = interpreter()
            .execute_step(
                &step("delay", json!({"durationMs": 5000}), Some(50)),
                &ctx(),
            )
            .await;
        // Within the timeout plus scheduler slack, not the full delay.
        assert!(start.elapsed() < Duration::from_millis(1000));
        assert_eq!(outcome.status, StepResultStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("Step timed out after 50ms"));
    }

    #[tokio::test]
    async fn test_handler_error_converted_to_failed_outcome() {
        // delay without durationMs is a handler config error
        let outcome = interpreter()
            .execute_step(&step("delay", json!({}), None), &ctx())
            .await;
        assert_eq!(outcome.status, StepResultStatus::Failed);
        assert!(outcome.error.unwrap().contains("invalid step config"));
    }

    #[tokio::test]
    async fn test_failure_injection_always_fires_at_rate_one() {
        let outcome = interpreter()
            .execute_step(
                &step("log", json!({"message": "hi", "failureRate": 1.0}), None),
                &ctx(),
            )
            .await;
        assert_eq!(outcome.status, StepResultStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("Simulated random failure"));
    }

    #[tokio::test]
    async fn test_failure_injection_never_fires_at_rate_zero() {
        for _ in 0..20 {
            let outcome = interpreter()
                .execute_step(
                    &step("log", json!({"message": "hi", "failureRate": 0.0}), None),
                    &ctx(),
                )
                .await;
            assert!(outcome.is_completed());
        }
    }

    #[tokio::test]
    async fn test_duration_is_stamped() {
        let outcome = interpreter()
            .execute_step(&step("delay", json!({"durationMs": 40}), None), &ctx())
            .await;
        assert!(outcome.is_completed());
        assert!(outcome.duration_ms >= 40);
        assert!(outcome.completed_at >= outcome.started_at);
    }

    #[tokio::test]
    async fn test_step_result_materialization() {
        let outcome = interpreter()
            .execute_step(&step("log", json!({"message": "hi"}), None), &ctx())
            .await;
        let exec_id = Uuid::now_v7();
        let result = outcome.to_step_result(exec_id, "s1", 2);
        assert_eq!(result.execution_id, exec_id);
        assert_eq!(result.step_id, "s1");
        assert_eq!(result.attempt, 2);
        assert_eq!(result.status, StepResultStatus::Completed);
    }
}
