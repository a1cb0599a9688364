//! Execution store trait definition.
//!
//! Defines the storage interface for executions, step results, the
//! dead-letter queue, and execution logs. The infrastructure layer
//! (windlass-infra) implements this trait with SQLite persistence;
//! [`memory::MemoryExecutionStore`] is the in-process implementation used
//! for development and tests.
//!
//! The store is the sole durable state and the only coordination point
//! between workers. Uses native async fn in traits (Rust 2024 edition, no
//! async_trait macro).

pub mod memory;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use windlass_types::error::StoreError;
use windlass_types::execution::{
    CancelOutcome, DlqEntry, Execution, ExecutionFilter, ExecutionLogEntry, ExecutionPatch,
    NewExecution, StepResult,
};

/// Repository trait for execution persistence.
///
/// Claim semantics (the correctness-critical contract):
/// - `claim` atomically transitions up to `batch_size` rows that are
///   `pending`, or `retry_scheduled` with `next_retry_at <= now`, to
///   `running` with the caller recorded as owner, ordered by `created_at`
///   ascending. No row is ever returned to two callers, and a caller never
///   waits on another caller's claim beyond the claim statement itself.
/// - `create_execution` is insert-if-absent on the idempotency key: under
///   concurrent calls with the same key exactly one row is created and all
///   callers observe it.
pub trait ExecutionStore: Send + Sync {
    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    /// Create a pending execution, or return the existing one when the
    /// idempotency key is already bound.
    fn create_execution(
        &self,
        new: NewExecution,
    ) -> impl std::future::Future<Output = Result<Execution, StoreError>> + Send;

    /// Atomically claim up to `batch_size` due executions for `worker_id`.
    fn claim(
        &self,
        worker_id: &str,
        batch_size: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Execution>, StoreError>> + Send;

    /// Fresh point read.
    fn get_execution(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Execution>, StoreError>> + Send;

    /// Partial update of mutable fields. Last-writer-wins.
    fn update_execution(
        &self,
        id: &Uuid,
        patch: ExecutionPatch,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Look up an execution by its idempotency key.
    fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Execution>, StoreError>> + Send;

    /// Operator-facing listing; not used by the hot path.
    fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> impl std::future::Future<Output = Result<Vec<Execution>, StoreError>> + Send;

    /// Mark an execution cancelled unless it is already terminal.
    fn cancel_execution(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<CancelOutcome, StoreError>> + Send;

    /// Release claims older than `older_than`: clear worker ownership and
    /// restore status to pending. Returns the number of rows released.
    fn release_stale_locks(
        &self,
        older_than: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;

    // -----------------------------------------------------------------------
    // Step results
    // -----------------------------------------------------------------------

    /// Append one attempt row. Never overwrites a prior attempt.
    fn append_step_result(
        &self,
        result: StepResult,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// All attempts for an execution, in attempt order per step.
    fn list_step_results(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<StepResult>, StoreError>> + Send;

    // -----------------------------------------------------------------------
    // Dead-letter queue
    // -----------------------------------------------------------------------

    /// Append a terminal-failure record.
    fn append_dlq(
        &self,
        entry: DlqEntry,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// All dead-letter entries, newest first.
    fn list_dlq(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<DlqEntry>, StoreError>> + Send;

    // -----------------------------------------------------------------------
    // Execution logs
    // -----------------------------------------------------------------------

    /// Append collected log lines.
    fn append_logs(
        &self,
        entries: Vec<ExecutionLogEntry>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Log lines for an execution, in timestamp order.
    fn list_logs(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ExecutionLogEntry>, StoreError>> + Send;
}
