//! Execution runner: advances one claimed execution through its step graph
//! with durable checkpointing.
//!
//! Entered by a worker after a successful claim (status is already
//! `running`). The loop per step:
//!
//! 1. Cancellation check (re-read the row; cancellation is cooperative and
//!    observed only at step boundaries).
//! 2. Persist the resume pointer (`current_step_id`) — the crash-safety
//!    checkpoint: a worker death from here on restarts at this step.
//! 3. Execute the step via the interpreter.
//! 4. Cancellation re-check; the in-flight attempt's result is still
//!    appended for auditability before bailing.
//! 5. Branch: success folds the output into the state snapshot and resets
//!    retry_count; a recoverable failure schedules a retry and returns,
//!    releasing the worker; an exhausted retry budget is a terminal failure
//!    recorded in the DLQ. The `on_error` successor is deliberately not
//!    consulted on the exhausted path.
//!
//! The runner is the sole writer to its execution row while running; the
//! claim primitive guarantees it is never invoked twice concurrently for the
//! same execution.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;
use windlass_types::config::RetryDefaults;
use windlass_types::error::StoreError;
use windlass_types::execution::{
    DlqEntry, Execution, ExecutionPatch, ExecutionStatus,
};

use crate::backoff;
use crate::context::{seed_state, StepContext};
use crate::interpreter::StepInterpreter;
use crate::resolver::DefinitionResolver;
use crate::store::ExecutionStore;

// ---------------------------------------------------------------------------
// RunnerError
// ---------------------------------------------------------------------------

/// Errors that abort a run before the execution can be advanced. Step
/// failures are not errors here; they are outcomes the runner persists.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("definition '{name}'@{version} not resolvable")]
    DefinitionNotFound { name: String, version: String },
}

// ---------------------------------------------------------------------------
// ExecutionRunner
// ---------------------------------------------------------------------------

/// Advances claimed executions. Generic over the store and resolver so the
/// same runner drives the SQLite store in production and the in-memory store
/// in tests.
pub struct ExecutionRunner<S, R> {
    store: Arc<S>,
    resolver: Arc<R>,
    interpreter: StepInterpreter,
    retry_defaults: RetryDefaults,
}

impl<S: ExecutionStore, R: DefinitionResolver> ExecutionRunner<S, R> {
    pub fn new(
        store: Arc<S>,
        resolver: Arc<R>,
        interpreter: StepInterpreter,
        retry_defaults: RetryDefaults,
    ) -> Self {
        Self {
            store,
            resolver,
            interpreter,
            retry_defaults,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one claimed execution until it completes, schedules a retry,
    /// fails terminally, or observes cancellation.
    pub async fn run(&self, execution_id: Uuid) -> Result<(), RunnerError> {
        let execution = self
            .store
            .get_execution(&execution_id)
            .await?
            .ok_or(RunnerError::ExecutionNotFound(execution_id))?;

        let definition = self
            .resolver
            .resolve(&execution.workflow_name, Some(&execution.workflow_version))
            .await
            .ok_or_else(|| RunnerError::DefinitionNotFound {
                name: execution.workflow_name.clone(),
                version: execution.workflow_version.clone(),
            })?;

        // Resume point: the persisted checkpoint, else the entry step.
        let mut cursor = execution
            .current_step_id
            .clone()
            .or_else(|| definition.entry_step().map(|s| s.id.clone()));

        let state = seed_state(&execution.input, execution.output.as_ref());
        let mut ctx = StepContext::new(execution_id, state);
        let mut retry_count = execution.retry_count;

        tracing::info!(
            execution_id = %execution_id,
            workflow = execution.workflow_name.as_str(),
            resume_at = cursor.as_deref().unwrap_or("<entry>"),
            retry_count,
            "running execution"
        );

        while let Some(step_id) = cursor {
            let Some(step) = definition.step(&step_id) else {
                // A dangling successor reference. Definitions are validated
                // upstream, so this is a terminal definition error.
                let error = format!("Step '{step_id}' not found in definition");
                self.fail_terminal(&execution, &ctx, Some(&step_id), &error, retry_count.max(1))
                    .await?;
                return Ok(());
            };

            // (1) Cancellation check before the step.
            if self.observed_cancellation(&ctx, &step_id).await? {
                self.flush_logs(&ctx).await?;
                return Ok(());
            }

            // (2) Checkpoint the resume pointer.
            self.store
                .update_execution(
                    &execution_id,
                    ExecutionPatch::default().current_step(step_id.clone()),
                )
                .await?;

            // (3) Execute.
            let outcome = self.interpreter.execute_step(step, &ctx).await;
            let attempt = retry_count + 1;

            // (4) Cancellation re-check; steps may be long. The in-flight
            // attempt's result is appended for auditability before bailing.
            if self.observed_cancellation(&ctx, &step_id).await? {
                self.store
                    .append_step_result(outcome.to_step_result(execution_id, &step_id, attempt))
                    .await?;
                self.flush_logs(&ctx).await?;
                return Ok(());
            }

            // (5) Branch on the outcome.
            self.store
                .append_step_result(outcome.to_step_result(execution_id, &step_id, attempt))
                .await?;

            if outcome.is_completed() {
                ctx.state.insert(
                    step_id.clone(),
                    outcome.output.clone().unwrap_or(Value::Null),
                );
                self.store
                    .update_execution(
                        &execution_id,
                        ExecutionPatch::default()
                            .output(Value::Object(ctx.state.clone()))
                            .retry_count(0)
                            .clear_next_retry(),
                    )
                    .await?;
                retry_count = 0;
                cursor = outcome.next.clone();
            } else {
                let policy = self.retry_defaults.resolve(step.retry.as_ref());
                let error = outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "step failed".to_string());

                if attempt < policy.max_attempts {
                    self.schedule_retry(&execution_id, &step_id, &error, attempt, &policy)
                        .await?;
                    self.flush_logs(&ctx).await?;
                    return Ok(());
                }

                self.fail_terminal(&execution, &ctx, Some(&step_id), &error, attempt)
                    .await?;
                return Ok(());
            }
        }

        // Cursor exhausted: the workflow completed.
        self.store
            .update_execution(
                &execution_id,
                ExecutionPatch::default()
                    .status(ExecutionStatus::Completed)
                    .output(Value::Object(ctx.state.clone()))
                    .completed_at(Utc::now())
                    .clear_current_step()
                    .clear_next_retry()
                    .release_worker(),
            )
            .await?;
        self.flush_logs(&ctx).await?;

        tracing::info!(execution_id = %execution_id, "execution completed");
        Ok(())
    }

    /// Re-read the execution; on observed cancellation, cancel the context
    /// token (so cooperative handlers short-circuit) and record a notice.
    async fn observed_cancellation(
        &self,
        ctx: &StepContext,
        step_id: &str,
    ) -> Result<bool, RunnerError> {
        let current = self
            .store
            .get_execution(&ctx.execution_id)
            .await?
            .ok_or(RunnerError::ExecutionNotFound(ctx.execution_id))?;

        if current.status == ExecutionStatus::Cancelled {
            ctx.cancellation.cancel();
            ctx.logs.push(
                ctx.execution_id,
                Some(step_id),
                "info",
                "execution cancelled, stopping",
            );
            tracing::info!(
                execution_id = %ctx.execution_id,
                step_id,
                "cancellation observed, bailing out"
            );
            return Ok(true);
        }
        Ok(false)
    }

    async fn schedule_retry(
        &self,
        execution_id: &Uuid,
        step_id: &str,
        error: &str,
        attempt: u32,
        policy: &windlass_types::definition::RetryPolicy,
    ) -> Result<(), RunnerError> {
        let delay_ms = backoff::next_delay_ms(attempt, policy);
        let next_retry_at = Utc::now() + chrono::Duration::milliseconds(delay_ms as i64);

        tracing::warn!(
            execution_id = %execution_id,
            step_id,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms,
            error,
            "step failed, retry scheduled"
        );

        // Releasing worker ownership here frees the slot; the execution is
        // re-claimed once next_retry_at is due.
        self.store
            .update_execution(
                execution_id,
                ExecutionPatch::default()
                    .status(ExecutionStatus::RetryScheduled)
                    .retry_count(attempt)
                    .next_retry_at(next_retry_at)
                    .error(error)
                    .current_step(step_id)
                    .release_worker(),
            )
            .await?;
        Ok(())
    }

    async fn fail_terminal(
        &self,
        execution: &Execution,
        ctx: &StepContext,
        step_id: Option<&str>,
        error: &str,
        total_attempts: u32,
    ) -> Result<(), RunnerError> {
        tracing::error!(
            execution_id = %execution.id,
            step_id = step_id.unwrap_or("<none>"),
            total_attempts,
            error,
            "execution failed terminally"
        );

        self.store
            .update_execution(
                &execution.id,
                ExecutionPatch::default()
                    .status(ExecutionStatus::Failed)
                    .error(error)
                    .output(Value::Object(ctx.state.clone()))
                    .completed_at(Utc::now())
                    .release_worker(),
            )
            .await?;

        self.store
            .append_dlq(DlqEntry {
                id: Uuid::now_v7(),
                execution_id: execution.id,
                workflow_name: execution.workflow_name.clone(),
                workflow_version: execution.workflow_version.clone(),
                reason: "max retry attempts exceeded".to_string(),
                last_error: Some(error.to_string()),
                total_attempts,
                input: execution.input.clone(),
                last_step_id: step_id.map(str::to_string),
                failed_at: Utc::now(),
            })
            .await?;

        self.flush_logs(ctx).await?;
        Ok(())
    }

    async fn flush_logs(&self, ctx: &StepContext) -> Result<(), RunnerError> {
        let entries = ctx.logs.drain();
        if !entries.is_empty() {
            self.store.append_logs(entries).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerError, HandlerOutput, HandlerRegistry, StepHandler};
    use crate::resolver::StaticResolver;
    use crate::store::memory::MemoryExecutionStore;
    use futures_util::future::BoxFuture;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use windlass_types::definition::{PinnedDefinition, RetryPolicy, StepDefinition};
    use windlass_types::execution::{NewExecution, StepResultStatus};

    /// Fails the first `failures` invocations, then succeeds.
    struct FlakyHandler {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyHandler {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl StepHandler for FlakyHandler {
        fn step_type(&self) -> &'static str {
            "flaky"
        }

        fn execute<'a>(
            &'a self,
            step: &'a StepDefinition,
            _ctx: &'a crate::context::StepContext,
        ) -> BoxFuture<'a, Result<HandlerOutput, HandlerError>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.failures {
                    Err(HandlerError::Failed("transient upstream error".to_string()))
                } else {
                    Ok(HandlerOutput::with_next(json!({"recovered": true}), step))
                }
            })
        }
    }

    fn step(id: &str, step_type: &str, config: Value, next: Option<&str>) -> StepDefinition {
        StepDefinition {
            id: id.to_string(),
            step_type: step_type.to_string(),
            config,
            next: next.map(str::to_string),
            on_error: None,
            timeout_ms: None,
            retry: None,
        }
    }

    struct Harness {
        store: Arc<MemoryExecutionStore>,
        resolver: Arc<StaticResolver>,
        registry: Arc<HandlerRegistry>,
    }

    impl Harness {
        fn new(definition: PinnedDefinition) -> Self {
            let resolver = Arc::new(StaticResolver::new());
            resolver.register(definition);
            Self {
                store: Arc::new(MemoryExecutionStore::new()),
                resolver,
                registry: Arc::new(HandlerRegistry::with_builtins()),
            }
        }

        fn runner(&self) -> ExecutionRunner<MemoryExecutionStore, StaticResolver> {
            ExecutionRunner::new(
                self.store.clone(),
                self.resolver.clone(),
                StepInterpreter::new(self.registry.clone(), 60_000),
                RetryDefaults::default(),
            )
        }

        async fn submit_and_claim(&self, input: Value) -> Uuid {
            let execution = self
                .store
                .create_execution(NewExecution {
                    workflow_name: "wf".to_string(),
                    workflow_version: "1.0.0".to_string(),
                    input,
                    idempotency_key: None,
                })
                .await
                .unwrap();
            let claimed = self.store.claim("test-worker", 1).await.unwrap();
            assert_eq!(claimed.len(), 1);
            execution.id
        }

        /// Claim whatever is due and run it, until nothing is due.
        async fn drain(&self) {
            loop {
                let claimed = self.store.claim("test-worker", 10).await.unwrap();
                if claimed.is_empty() {
                    break;
                }
                for execution in claimed {
                    self.runner().run(execution.id).await.unwrap();
                }
            }
        }
    }

    fn linear_definition() -> PinnedDefinition {
        PinnedDefinition {
            name: "wf".to_string(),
            version: "1.0.0".to_string(),
            steps: vec![
                step("announce", "log", json!({"message": "starting"}), Some("reshape")),
                step(
                    "reshape",
                    "transform",
                    json!({"mapping": {"seen": "announce.logged"}}),
                    Some("finish"),
                ),
                step("finish", "log", json!({"message": "done"}), None),
            ],
        }
    }

    #[tokio::test]
    async fn test_happy_path_completes_with_state() {
        let harness = Harness::new(linear_definition());
        let id = harness.submit_and_claim(json!({"orderId": 7})).await;

        harness.runner().run(id).await.unwrap();

        let execution = harness.store.get_execution(&id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.completed_at.is_some());
        assert!(execution.worker_id.is_none());
        assert!(execution.current_step_id.is_none());

        let output = execution.output.unwrap();
        assert_eq!(output["announce"], json!({"logged": true}));
        assert_eq!(output["reshape"], json!({"seen": true}));
        assert_eq!(output["orderId"], json!(7));

        let results = harness.store.list_step_results(&id).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.status == StepResultStatus::Completed));
        assert!(results.iter().all(|r| r.attempt == 1));

        let logs = harness.store.list_logs(&id).await.unwrap();
        let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
        assert!(messages.contains(&"starting"));
        assert!(messages.contains(&"done"));
    }

    #[tokio::test]
    async fn test_condition_branches_to_on_false() {
        let definition = PinnedDefinition {
            name: "wf".to_string(),
            version: "1.0.0".to_string(),
            steps: vec![
                step(
                    "check",
                    "condition",
                    json!({
                        "field": "flag",
                        "operator": "eq",
                        "value": true,
                        "onTrue": "yes",
                        "onFalse": "no",
                    }),
                    None,
                ),
                step("yes", "log", json!({"message": "took true"}), None),
                step("no", "log", json!({"message": "took false"}), None),
            ],
        };
        let harness = Harness::new(definition);
        let id = harness.submit_and_claim(json!({"flag": false})).await;

        harness.runner().run(id).await.unwrap();

        let results = harness.store.list_step_results(&id).await.unwrap();
        let step_ids: Vec<&str> = results.iter().map(|r| r.step_id.as_str()).collect();
        assert_eq!(step_ids, vec!["check", "no"]);
    }

    #[tokio::test]
    async fn test_retries_then_success() {
        let mut definition = linear_definition();
        definition.steps[1] = StepDefinition {
            id: "reshape".to_string(),
            step_type: "flaky".to_string(),
            config: Value::Null,
            next: Some("finish".to_string()),
            on_error: None,
            timeout_ms: None,
            retry: Some(RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 10,
                backoff_multiplier: 2.0,
                max_delay_ms: 50,
            }),
        };
        let harness = Harness::new(definition);
        harness.registry.register(Arc::new(FlakyHandler::new(2)));

        let id = harness.submit_and_claim(json!({})).await;
        harness.runner().run(id).await.unwrap();

        // First run scheduled a retry and released the worker.
        let execution = harness.store.get_execution(&id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::RetryScheduled);
        assert_eq!(execution.retry_count, 1);
        assert!(execution.next_retry_at.is_some());
        assert!(execution.worker_id.is_none());
        assert_eq!(execution.current_step_id.as_deref(), Some("reshape"));

        // Let the scheduled retries become due and drain them.
        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        harness.drain().await;
        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        harness.drain().await;

        let execution = harness.store.get_execution(&id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.retry_count, 0);

        let results = harness.store.list_step_results(&id).await.unwrap();
        let flaky: Vec<_> = results.iter().filter(|r| r.step_id == "reshape").collect();
        assert_eq!(flaky.len(), 3);
        assert_eq!(
            flaky.iter().map(|r| r.attempt).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(flaky[0].status, StepResultStatus::Failed);
        assert_eq!(flaky[1].status, StepResultStatus::Failed);
        assert_eq!(flaky[2].status, StepResultStatus::Completed);
    }

    #[tokio::test]
    async fn test_retries_exhausted_lands_in_dlq() {
        let definition = PinnedDefinition {
            name: "wf".to_string(),
            version: "1.0.0".to_string(),
            steps: vec![StepDefinition {
                id: "doomed".to_string(),
                step_type: "flaky".to_string(),
                config: Value::Null,
                next: None,
                on_error: Some("doomed".to_string()),
                timeout_ms: None,
                retry: Some(RetryPolicy {
                    max_attempts: 2,
                    base_delay_ms: 10,
                    backoff_multiplier: 2.0,
                    max_delay_ms: 20,
                }),
            }],
        };
        let harness = Harness::new(definition);
        harness.registry.register(Arc::new(FlakyHandler::new(u32::MAX)));

        let id = harness.submit_and_claim(json!({"n": 1})).await;
        harness.runner().run(id).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        harness.drain().await;

        let execution = harness.store.get_execution(&id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.completed_at.is_some());
        assert_eq!(
            execution.error.as_deref(),
            Some("transient upstream error")
        );

        let results = harness.store.list_step_results(&id).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.status == StepResultStatus::Failed));

        let dlq = harness.store.list_dlq().await.unwrap();
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].execution_id, id);
        assert!(dlq[0].total_attempts >= 2);
        assert_eq!(dlq[0].last_step_id.as_deref(), Some("doomed"));
        // The on_error successor is not honored on the exhausted path: no
        // step beyond "doomed" ever ran.
        assert!(results.iter().all(|r| r.step_id == "doomed"));
    }

    #[tokio::test]
    async fn test_single_attempt_budget_fails_immediately() {
        let definition = PinnedDefinition {
            name: "wf".to_string(),
            version: "1.0.0".to_string(),
            steps: vec![StepDefinition {
                id: "one-shot".to_string(),
                step_type: "flaky".to_string(),
                config: Value::Null,
                next: None,
                on_error: None,
                timeout_ms: None,
                retry: Some(RetryPolicy {
                    max_attempts: 1,
                    base_delay_ms: 10,
                    backoff_multiplier: 2.0,
                    max_delay_ms: 20,
                }),
            }],
        };
        let harness = Harness::new(definition);
        harness.registry.register(Arc::new(FlakyHandler::new(u32::MAX)));

        let id = harness.submit_and_claim(json!({})).await;
        harness.runner().run(id).await.unwrap();

        let execution = harness.store.get_execution(&id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);

        let results = harness.store.list_step_results(&id).await.unwrap();
        assert_eq!(results.len(), 1, "no retry is ever scheduled");
        assert_eq!(results[0].attempt, 1);
        assert_eq!(harness.store.list_dlq().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_skips_completed_steps() {
        let harness = Harness::new(linear_definition());
        let id = harness.submit_and_claim(json!({})).await;

        // Simulate a prior attempt that completed "announce" and crashed at
        // "reshape": checkpoint points there, snapshot has announce output.
        harness
            .store
            .update_execution(
                &id,
                ExecutionPatch::default()
                    .current_step("reshape")
                    .output(json!({"announce": {"logged": true}})),
            )
            .await
            .unwrap();

        harness.runner().run(id).await.unwrap();

        let results = harness.store.list_step_results(&id).await.unwrap();
        let step_ids: Vec<&str> = results.iter().map(|r| r.step_id.as_str()).collect();
        assert_eq!(step_ids, vec!["reshape", "finish"], "announce must not re-run");

        let execution = harness.store.get_execution(&id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(
            execution.output.unwrap()["reshape"],
            json!({"seen": true})
        );
    }

    #[tokio::test]
    async fn test_cancellation_mid_step_persists_result_and_bails() {
        let definition = PinnedDefinition {
            name: "wf".to_string(),
            version: "1.0.0".to_string(),
            steps: vec![
                StepDefinition {
                    id: "slow".to_string(),
                    step_type: "delay".to_string(),
                    config: json!({"durationMs": 5000}),
                    next: Some("never".to_string()),
                    on_error: None,
                    timeout_ms: Some(300),
                    retry: None,
                },
                step("never", "log", json!({"message": "unreachable"}), None),
            ],
        };
        let harness = Harness::new(definition);
        let id = harness.submit_and_claim(json!({})).await;

        let runner = harness.runner();
        let store = harness.store.clone();
        let run = tokio::spawn(async move { runner.run(id).await });

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        store.cancel_execution(&id).await.unwrap();
        run.await.unwrap().unwrap();

        let execution = harness.store.get_execution(&id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Cancelled);

        // The in-flight attempt (timeout-failed) is persisted for audit,
        // and nothing past the cancellation point ran.
        let results = harness.store.list_step_results(&id).await.unwrap();
        assert!(results.len() <= 1);
        if let Some(result) = results.first() {
            assert_eq!(result.step_id, "slow");
            assert_eq!(result.status, StepResultStatus::Failed);
            assert!(result.error.as_deref().unwrap().contains("timed out"));
        }
        assert!(results.iter().all(|r| r.step_id != "never"));
    }

    #[tokio::test]
    async fn test_dangling_successor_is_terminal() {
        let definition = PinnedDefinition {
            name: "wf".to_string(),
            version: "1.0.0".to_string(),
            steps: vec![step(
                "start",
                "log",
                json!({"message": "hi"}),
                Some("ghost"),
            )],
        };
        let harness = Harness::new(definition);
        let id = harness.submit_and_claim(json!({})).await;

        harness.runner().run(id).await.unwrap();

        let execution = harness.store.get_execution(&id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.error.unwrap().contains("ghost"));
        assert_eq!(harness.store.list_dlq().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_status_never_mutates_again() {
        let harness = Harness::new(linear_definition());
        let id = harness.submit_and_claim(json!({})).await;
        harness.runner().run(id).await.unwrap();

        let outcome = harness.store.cancel_execution(&id).await.unwrap();
        assert_eq!(outcome, windlass_types::execution::CancelOutcome::Conflict);

        let execution = harness.store.get_execution(&id).await.unwrap().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
    }
}
