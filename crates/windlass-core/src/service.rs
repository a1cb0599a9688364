//! Orchestrator service: the inbound facade consumed by the CLI and REST
//! surfaces.
//!
//! Wraps the store and resolver with trigger semantics: submitting an event
//! pins the workflow version and creates (or dedupes onto) a pending
//! execution; cancellation, lookups, DLQ listing and the stale-lock release
//! are thin, validated pass-throughs.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;
use windlass_types::config::ClaimConfig;
use windlass_types::error::StoreError;
use windlass_types::execution::{
    CancelOutcome, DlqEntry, Execution, ExecutionFilter, ExecutionLogEntry, ExecutionStatus,
    NewExecution, StepResult,
};

use crate::resolver::DefinitionResolver;
use crate::store::ExecutionStore;

// ---------------------------------------------------------------------------
// Errors and results
// ---------------------------------------------------------------------------

/// Errors surfaced to trigger callers and operators.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The workflow name does not resolve to a definition.
    #[error("workflow '{0}' not found")]
    WorkflowNotFound(String),

    /// The execution id does not exist.
    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    /// Underlying store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Accepted-trigger receipt (202 semantics: the execution runs later).
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
}

/// Execution plus its audit trail.
#[derive(Debug, Clone)]
pub struct ExecutionDetail {
    pub execution: Execution,
    pub step_results: Vec<StepResult>,
    pub logs: Vec<ExecutionLogEntry>,
}

// ---------------------------------------------------------------------------
// OrchestratorService
// ---------------------------------------------------------------------------

/// Inbound operations over the execution subsystem.
pub struct OrchestratorService<S, R> {
    store: Arc<S>,
    resolver: Arc<R>,
    claim: ClaimConfig,
}

impl<S: ExecutionStore, R: DefinitionResolver> OrchestratorService<S, R> {
    pub fn new(store: Arc<S>, resolver: Arc<R>, claim: ClaimConfig) -> Self {
        Self {
            store,
            resolver,
            claim,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Accept a trigger event: pin the workflow's current version and create
    /// a pending execution. With an idempotency key, concurrent and repeated
    /// submissions all observe the same execution.
    pub async fn submit_event(
        &self,
        workflow_name: &str,
        input: Value,
        idempotency_key: Option<String>,
    ) -> Result<SubmitReceipt, ServiceError> {
        let definition = self
            .resolver
            .resolve(workflow_name, None)
            .await
            .ok_or_else(|| ServiceError::WorkflowNotFound(workflow_name.to_string()))?;

        let execution = self
            .store
            .create_execution(NewExecution {
                workflow_name: definition.name.clone(),
                workflow_version: definition.version.clone(),
                input,
                idempotency_key,
            })
            .await?;

        tracing::info!(
            execution_id = %execution.id,
            workflow = workflow_name,
            version = definition.version.as_str(),
            status = execution.status.as_str(),
            "event accepted"
        );

        Ok(SubmitReceipt {
            execution_id: execution.id,
            status: execution.status,
        })
    }

    /// Request cancellation. Conflict when the execution is already
    /// terminal; running executions observe the cancel at their next step
    /// boundary.
    pub async fn cancel(&self, execution_id: Uuid) -> Result<CancelOutcome, ServiceError> {
        match self.store.cancel_execution(&execution_id).await {
            Ok(outcome) => {
                tracing::info!(execution_id = %execution_id, ?outcome, "cancel requested");
                Ok(outcome)
            }
            Err(StoreError::NotFound) => Err(ServiceError::ExecutionNotFound(execution_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Point read with the full audit trail.
    pub async fn get_execution(&self, execution_id: Uuid) -> Result<ExecutionDetail, ServiceError> {
        let execution = self
            .store
            .get_execution(&execution_id)
            .await?
            .ok_or(ServiceError::ExecutionNotFound(execution_id))?;
        let step_results = self.store.list_step_results(&execution_id).await?;
        let logs = self.store.list_logs(&execution_id).await?;
        Ok(ExecutionDetail {
            execution,
            step_results,
            logs,
        })
    }

    pub async fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<Execution>, ServiceError> {
        Ok(self.store.list_executions(filter).await?)
    }

    pub async fn list_dlq(&self) -> Result<Vec<DlqEntry>, ServiceError> {
        Ok(self.store.list_dlq().await?)
    }

    /// Release claims older than the configured stale threshold.
    pub async fn release_stale_locks(&self) -> Result<u64, ServiceError> {
        let threshold =
            Utc::now() - chrono::Duration::minutes(self.claim.stale_lock_threshold_min as i64);
        Ok(self.store.release_stale_locks(threshold).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
