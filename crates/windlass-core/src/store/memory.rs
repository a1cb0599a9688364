//! In-memory execution store for development and tests.
//!
//! All state lives behind a single async mutex, which trivially gives the
//! claim and idempotent-create operations their atomicity. Not durable; the
//! SQLite store in windlass-infra is the production implementation and the
//! contract both must satisfy is identical.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;
use windlass_types::error::StoreError;
use windlass_types::execution::{
    CancelOutcome, DlqEntry, Execution, ExecutionFilter, ExecutionLogEntry, ExecutionPatch,
    ExecutionStatus, NewExecution, StepResult,
};

use super::ExecutionStore;

#[derive(Default)]
struct Inner {
    executions: HashMap<Uuid, Execution>,
    idempotency: HashMap<String, Uuid>,
    step_results: Vec<StepResult>,
    dlq: Vec<DlqEntry>,
    logs: Vec<ExecutionLogEntry>,
}

/// Mutex-guarded in-process implementation of [`ExecutionStore`].
#[derive(Clone, Default)]
pub struct MemoryExecutionStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_patch(execution: &mut Execution, patch: ExecutionPatch) {
    if let Some(status) = patch.status {
        execution.status = status;
    }
    if let Some(output) = patch.output {
        execution.output = Some(output);
    }
    if let Some(error) = patch.error {
        execution.error = error;
    }
    if let Some(current_step_id) = patch.current_step_id {
        execution.current_step_id = current_step_id;
    }
    if let Some(retry_count) = patch.retry_count {
        execution.retry_count = retry_count;
    }
    if let Some(next_retry_at) = patch.next_retry_at {
        execution.next_retry_at = next_retry_at;
    }
    if let Some(started_at) = patch.started_at {
        execution.started_at = Some(started_at);
    }
    if let Some(completed_at) = patch.completed_at {
        execution.completed_at = Some(completed_at);
    }
    if let Some(worker_id) = patch.worker_id {
        execution.worker_id = worker_id;
    }
    if let Some(locked_at) = patch.locked_at {
        execution.locked_at = locked_at;
    }
    execution.updated_at = Utc::now();
}

impl ExecutionStore for MemoryExecutionStore {
    async fn create_execution(&self, new: NewExecution) -> Result<Execution, StoreError> {
        let mut inner = self.inner.lock().await;

        if let Some(key) = &new.idempotency_key {
            if let Some(existing_id) = inner.idempotency.get(key) {
                let existing = inner
                    .executions
                    .get(existing_id)
                    .ok_or(StoreError::NotFound)?;
                return Ok(existing.clone());
            }
        }

        let now = Utc::now();
        let execution = Execution {
            id: Uuid::now_v7(),
            workflow_name: new.workflow_name,
            workflow_version: new.workflow_version,
            status: ExecutionStatus::Pending,
            input: new.input,
            output: None,
            error: None,
            current_step_id: None,
            retry_count: 0,
            next_retry_at: None,
            worker_id: None,
            locked_at: None,
            idempotency_key: new.idempotency_key.clone(),
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        };

        if let Some(key) = &new.idempotency_key {
            inner.idempotency.insert(key.clone(), execution.id);
        }
        inner.executions.insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn claim(
        &self,
        worker_id: &str,
        batch_size: usize,
    ) -> Result<Vec<Execution>, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let mut due: Vec<Uuid> = inner
            .executions
            .values()
            .filter(|e| match e.status {
                ExecutionStatus::Pending => true,
                ExecutionStatus::RetryScheduled => {
                    e.next_retry_at.is_some_and(|at| at <= now)
                }
                _ => false,
            })
            .map(|e| e.id)
            .collect();
        due.sort_by_key(|id| inner.executions[id].created_at);
        due.truncate(batch_size);

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            let execution = inner.executions.get_mut(&id).expect("id just collected");
            execution.status = ExecutionStatus::Running;
            execution.worker_id = Some(worker_id.to_string());
            execution.locked_at = Some(now);
            execution.started_at = execution.started_at.or(Some(now));
            execution.updated_at = now;
            claimed.push(execution.clone());
        }
        Ok(claimed)
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<Execution>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.executions.get(id).cloned())
    }

    async fn update_execution(
        &self,
        id: &Uuid,
        patch: ExecutionPatch,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let execution = inner.executions.get_mut(id).ok_or(StoreError::NotFound)?;
        apply_patch(execution, patch);
        Ok(())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Execution>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .idempotency
            .get(key)
            .and_then(|id| inner.executions.get(id))
            .cloned())
    }

    async fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<Execution>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<Execution> = inner
            .executions
            .values()
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .filter(|e| {
                filter
                    .workflow_name
                    .as_deref()
                    .is_none_or(|name| e.workflow_name == name)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|e| std::cmp::Reverse(e.created_at));
        rows.truncate(filter.limit as usize);
        Ok(rows)
    }

    async fn cancel_execution(&self, id: &Uuid) -> Result<CancelOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        let execution = inner.executions.get_mut(id).ok_or(StoreError::NotFound)?;
        if execution.status.is_terminal() {
            return Ok(CancelOutcome::Conflict);
        }
        let now = Utc::now();
        execution.status = ExecutionStatus::Cancelled;
        execution.completed_at = Some(now);
        execution.worker_id = None;
        execution.locked_at = None;
        execution.updated_at = now;
        Ok(CancelOutcome::Cancelled)
    }

    async fn release_stale_locks(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut released = 0u64;
        for execution in inner.executions.values_mut() {
            if execution.status == ExecutionStatus::Running
                && execution.locked_at.is_some_and(|at| at < older_than)
            {
                execution.status = ExecutionStatus::Pending;
                execution.worker_id = None;
                execution.locked_at = None;
                execution.updated_at = Utc::now();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn append_step_result(&self, result: StepResult) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.step_results.push(result);
        Ok(())
    }

    async fn list_step_results(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<StepResult>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<StepResult> = inner
            .step_results
            .iter()
            .filter(|r| r.execution_id == *execution_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then(a.attempt.cmp(&b.attempt))
        });
        Ok(rows)
    }

    async fn append_dlq(&self, entry: DlqEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.dlq.push(entry);
        Ok(())
    }

    async fn list_dlq(&self) -> Result<Vec<DlqEntry>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows = inner.dlq.clone();
        rows.sort_by_key(|e| std::cmp::Reverse(e.failed_at));
        Ok(rows)
    }

    async fn append_logs(&self, entries: Vec<ExecutionLogEntry>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.logs.extend(entries);
        Ok(())
    }

    async fn list_logs(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<ExecutionLogEntry> = inner
            .logs
            .iter()
            .filter(|l| l.execution_id == *execution_id)
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.timestamp);
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn new_execution(key: Option<&str>) -> NewExecution {
        NewExecution {
            workflow_name: "demo-workflow".to_string(),
            workflow_version: "1.0.0".to_string(),
            input: json!({"n": 1}),
            idempotency_key: key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryExecutionStore::new();
        let created = store.create_execution(new_execution(None)).await.unwrap();
        assert_eq!(created.status, ExecutionStatus::Pending);

        let fetched = store.get_execution(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.workflow_name, "demo-workflow");
    }

    #[tokio::test]
    async fn test_idempotent_create_returns_existing() {
        let store = MemoryExecutionStore::new();
        let first = store
            .create_execution(new_execution(Some("evt-1")))
            .await
            .unwrap();
        let second = store
            .create_execution(new_execution(Some("evt-1")))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);

        let found = store.find_by_idempotency_key("evt-1").await.unwrap();
        assert_eq!(found.unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_concurrent_create_same_key_single_row() {
        let store = MemoryExecutionStore::new();
        let mut handles = Vec::new();
        for _ in 0..100 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create_execution(new_execution(Some("shared-key")))
                    .await
                    .unwrap()
                    .id
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 1, "all callers must observe one execution");
    }

    #[tokio::test]
    async fn test_claim_oldest_first_and_marks_running() {
        let store = MemoryExecutionStore::new();
        let first = store.create_execution(new_execution(None)).await.unwrap();
        let _second = store.create_execution(new_execution(None)).await.unwrap();

        let claimed = store.claim("w1", 1).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, first.id);
        assert_eq!(claimed[0].status, ExecutionStatus::Running);
        assert_eq!(claimed[0].worker_id.as_deref(), Some("w1"));
        assert!(claimed[0].locked_at.is_some());
        assert!(claimed[0].started_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_overlap() {
        let store = MemoryExecutionStore::new();
        for _ in 0..20 {
            store.create_execution(new_execution(None)).await.unwrap();
        }

        let mut handles = Vec::new();
        for w in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.claim(&format!("w{w}"), 5).await.unwrap()
            }));
        }

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for execution in handle.await.unwrap() {
                assert!(seen.insert(execution.id), "duplicate claim");
                total += 1;
            }
        }
        assert_eq!(total, 20);
    }

    #[tokio::test]
    async fn test_claim_skips_future_retries() {
        let store = MemoryExecutionStore::new();
        let execution = store.create_execution(new_execution(None)).await.unwrap();

        store
            .update_execution(
                &execution.id,
                ExecutionPatch::default()
                    .status(ExecutionStatus::RetryScheduled)
                    .next_retry_at(Utc::now() + chrono::Duration::hours(1)),
            )
            .await
            .unwrap();
        assert!(store.claim("w1", 10).await.unwrap().is_empty());

        store
            .update_execution(
                &execution.id,
                ExecutionPatch::default()
                    .next_retry_at(Utc::now() - chrono::Duration::seconds(1)),
            )
            .await
            .unwrap();
        let claimed = store.claim("w1", 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_non_terminal_then_conflict() {
        let store = MemoryExecutionStore::new();
        let execution = store.create_execution(new_execution(None)).await.unwrap();

        let outcome = store.cancel_execution(&execution.id).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Cancelled);

        let cancelled = store.get_execution(&execution.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, ExecutionStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());
        assert!(cancelled.worker_id.is_none());

        let outcome = store.cancel_execution(&execution.id).await.unwrap();
        assert_eq!(outcome, CancelOutcome::Conflict);
    }

    #[tokio::test]
    async fn test_cancelled_execution_never_claimed() {
        let store = MemoryExecutionStore::new();
        let execution = store.create_execution(new_execution(None)).await.unwrap();
        store
            .update_execution(
                &execution.id,
                ExecutionPatch::default()
                    .status(ExecutionStatus::RetryScheduled)
                    .next_retry_at(Utc::now() - chrono::Duration::seconds(1)),
            )
            .await
            .unwrap();

        store.cancel_execution(&execution.id).await.unwrap();
        assert!(store.claim("w1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_stale_locks() {
        let store = MemoryExecutionStore::new();
        let execution = store.create_execution(new_execution(None)).await.unwrap();
        store.claim("w1", 1).await.unwrap();

        // Claim is fresh: threshold in the past releases nothing
        let released = store
            .release_stale_locks(Utc::now() - chrono::Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(released, 0);

        // Threshold ahead of the lock time releases it
        let released = store
            .release_stale_locks(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(released, 1);

        let row = store.get_execution(&execution.id).await.unwrap().unwrap();
        assert_eq!(row.status, ExecutionStatus::Pending);
        assert!(row.worker_id.is_none());
        assert!(row.locked_at.is_none());
    }

    #[tokio::test]
    async fn test_step_results_ordered_by_attempt() {
        let store = MemoryExecutionStore::new();
        let execution = store.create_execution(new_execution(None)).await.unwrap();

        for attempt in 1..=3 {
            store
                .append_step_result(StepResult {
                    id: Uuid::now_v7(),
                    execution_id: execution.id,
                    step_id: "flaky".to_string(),
                    status: windlass_types::execution::StepResultStatus::Failed,
                    output: None,
                    error: Some("boom".to_string()),
                    attempt,
                    duration_ms: 5,
                    started_at: Utc::now(),
                    completed_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let results = store.list_step_results(&execution.id).await.unwrap();
        let attempts: Vec<u32> = results.iter().map(|r| r.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_list_executions_filters_by_status() {
        let store = MemoryExecutionStore::new();
        store.create_execution(new_execution(None)).await.unwrap();
        let done = store.create_execution(new_execution(None)).await.unwrap();
        store
            .update_execution(
                &done.id,
                ExecutionPatch::default().status(ExecutionStatus::Completed),
            )
            .await
            .unwrap();

        let filter = ExecutionFilter {
            status: Some(ExecutionStatus::Pending),
            workflow_name: None,
            limit: 10,
        };
        let rows = store.list_executions(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ExecutionStatus::Pending);
    }

    #[tokio::test]
    async fn test_dlq_append_and_list() {
        let store = MemoryExecutionStore::new();
        let execution = store.create_execution(new_execution(None)).await.unwrap();

        store
            .append_dlq(DlqEntry {
                id: Uuid::now_v7(),
                execution_id: execution.id,
                workflow_name: "demo-workflow".to_string(),
                workflow_version: "1.0.0".to_string(),
                reason: "max retry attempts exceeded".to_string(),
                last_error: Some("boom".to_string()),
                total_attempts: 3,
                input: json!({"n": 1}),
                last_step_id: Some("flaky".to_string()),
                failed_at: Utc::now(),
            })
            .await
            .unwrap();

        let entries = store.list_dlq().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].execution_id, execution.id);
        assert_eq!(entries[0].total_attempts, 3);
    }
}
