//! SQLite execution store implementation.
//!
//! Implements `ExecutionStore` from `windlass-core` using sqlx with split
//! read/write pools. Payloads are stored as JSON text, timestamps as
//! fixed-width RFC 3339 text (which also makes the claim ordering and
//! due-time comparisons plain string comparisons in SQL).
//!
//! The claim primitive is a single `UPDATE ... WHERE id IN (SELECT ...)
//! RETURNING *` statement on the single-connection writer pool: competing
//! callers serialize on the writer for one statement, so no execution is
//! ever handed to two workers and nobody waits on more than one statement.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use windlass_core::store::ExecutionStore;
use windlass_types::error::StoreError;
use windlass_types::execution::{
    CancelOutcome, DlqEntry, Execution, ExecutionFilter, ExecutionLogEntry, ExecutionPatch,
    ExecutionStatus, NewExecution, StepResult, StepResultStatus,
};

use super::pool::StorePools;

/// SQLite-backed implementation of `ExecutionStore`.
pub struct SqliteExecutionStore {
    pool: StorePools,
}

impl SqliteExecutionStore {
    /// Create a new store backed by the given pool pair.
    pub fn new(pool: StorePools) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct ExecutionRow {
    id: String,
    workflow_name: String,
    workflow_version: String,
    status: String,
    input: String,
    output: Option<String>,
    error: Option<String>,
    current_step_id: Option<String>,
    retry_count: i64,
    next_retry_at: Option<String>,
    worker_id: Option<String>,
    locked_at: Option<String>,
    idempotency_key: Option<String>,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    updated_at: String,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_name: row.try_get("workflow_name")?,
            workflow_version: row.try_get("workflow_version")?,
            status: row.try_get("status")?,
            input: row.try_get("input")?,
            output: row.try_get("output")?,
            error: row.try_get("error")?,
            current_step_id: row.try_get("current_step_id")?,
            retry_count: row.try_get("retry_count")?,
            next_retry_at: row.try_get("next_retry_at")?,
            worker_id: row.try_get("worker_id")?,
            locked_at: row.try_get("locked_at")?,
            idempotency_key: row.try_get("idempotency_key")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_execution(self) -> Result<Execution, StoreError> {
        let status = ExecutionStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Query(format!("invalid execution status: {}", self.status)))?;

        let input = serde_json::from_str(&self.input)
            .map_err(|e| StoreError::Query(format!("invalid input JSON: {e}")))?;

        let output = self
            .output
            .as_deref()
            .map(|s| {
                serde_json::from_str(s)
                    .map_err(|e| StoreError::Query(format!("invalid output JSON: {e}")))
            })
            .transpose()?;

        Ok(Execution {
            id: parse_uuid(&self.id)?,
            workflow_name: self.workflow_name,
            workflow_version: self.workflow_version,
            status,
            input,
            output,
            error: self.error,
            current_step_id: self.current_step_id,
            retry_count: self.retry_count as u32,
            next_retry_at: self.next_retry_at.as_deref().map(parse_datetime).transpose()?,
            worker_id: self.worker_id,
            locked_at: self.locked_at.as_deref().map(parse_datetime).transpose()?,
            idempotency_key: self.idempotency_key,
            created_at: parse_datetime(&self.created_at)?,
            started_at: self.started_at.as_deref().map(parse_datetime).transpose()?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct StepResultRow {
    id: String,
    execution_id: String,
    step_id: String,
    status: String,
    output: Option<String>,
    error: Option<String>,
    attempt: i64,
    duration_ms: i64,
    started_at: String,
    completed_at: String,
}

impl StepResultRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            execution_id: row.try_get("execution_id")?,
            step_id: row.try_get("step_id")?,
            status: row.try_get("status")?,
            output: row.try_get("output")?,
            error: row.try_get("error")?,
            attempt: row.try_get("attempt")?,
            duration_ms: row.try_get("duration_ms")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_step_result(self) -> Result<StepResult, StoreError> {
        let status = StepResultStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Query(format!("invalid step status: {}", self.status)))?;

        let output = self
            .output
            .as_deref()
            .map(|s| {
                serde_json::from_str(s)
                    .map_err(|e| StoreError::Query(format!("invalid step output: {e}")))
            })
            .transpose()?;

        Ok(StepResult {
            id: parse_uuid(&self.id)?,
            execution_id: parse_uuid(&self.execution_id)?,
            step_id: self.step_id,
            status,
            output,
            error: self.error,
            attempt: self.attempt as u32,
            duration_ms: self.duration_ms as u64,
            started_at: parse_datetime(&self.started_at)?,
            completed_at: parse_datetime(&self.completed_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    s.parse::<Uuid>()
        .map_err(|e| StoreError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width RFC 3339 so persisted timestamps sort lexicographically.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json_text(value: &serde_json::Value) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Query(format!("serialize JSON: {e}")))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ---------------------------------------------------------------------------
// ExecutionStore impl
// ---------------------------------------------------------------------------

impl ExecutionStore for SqliteExecutionStore {
    async fn create_execution(&self, new: NewExecution) -> Result<Execution, StoreError> {
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
            idempotency_key: new.idempotency_key,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        };

        let insert = sqlx::query(
            r#"INSERT INTO executions
               (id, workflow_name, workflow_version, status, input, retry_count,
                idempotency_key, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(execution.id.to_string())
        .bind(&execution.workflow_name)
        .bind(&execution.workflow_version)
        .bind(execution.status.as_str())
        .bind(to_json_text(&execution.input)?)
        .bind(execution.retry_count as i64)
        .bind(&execution.idempotency_key)
        .bind(format_datetime(&execution.created_at))
        .bind(format_datetime(&execution.updated_at))
        .execute(&self.pool.writer)
        .await;

        match insert {
            Ok(_) => Ok(execution),
            // Idempotency race: the unique index on idempotency_key fired,
            // so another caller created the row first. Return theirs.
            Err(err) if is_unique_violation(&err) => {
                let key = execution
                    .idempotency_key
                    .as_deref()
                    .ok_or_else(|| StoreError::Query(err.to_string()))?;
                self.find_by_idempotency_key(key)
                    .await?
                    .ok_or_else(|| StoreError::Conflict(format!("idempotency key '{key}' vanished")))
            }
            Err(err) => Err(StoreError::Query(err.to_string())),
        }
    }

    async fn claim(
        &self,
        worker_id: &str,
        batch_size: usize,
    ) -> Result<Vec<Execution>, StoreError> {
        if batch_size == 0 {
            return Ok(Vec::new());
        }
        let now = format_datetime(&Utc::now());

        let rows = sqlx::query(
            r#"UPDATE executions
                  SET status = 'running',
                      worker_id = ?,
                      locked_at = ?,
                      started_at = COALESCE(started_at, ?),
                      updated_at = ?
                WHERE id IN (
                      SELECT id FROM executions
                       WHERE status = 'pending'
                          OR (status = 'retry_scheduled'
                              AND next_retry_at IS NOT NULL
                              AND next_retry_at <= ?)
                       ORDER BY created_at ASC
                       LIMIT ?)
            RETURNING *"#,
        )
        .bind(worker_id)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .bind(batch_size as i64)
        .fetch_all(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = ExecutionRow::from_row(row).map_err(|e| StoreError::Query(e.to_string()))?;
            claimed.push(r.into_execution()?);
        }
        claimed.sort_by_key(|e| e.created_at);
        Ok(claimed)
    }

    async fn get_execution(&self, id: &Uuid) -> Result<Option<Execution>, StoreError> {
        let row = sqlx::query("SELECT * FROM executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = ExecutionRow::from_row(&row)
                    .map_err(|e| StoreError::Query(e.to_string()))?;
                Ok(Some(r.into_execution()?))
            }
            None => Ok(None),
        }
    }

    async fn update_execution(
        &self,
        id: &Uuid,
        patch: ExecutionPatch,
    ) -> Result<(), StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE executions SET updated_at = ");
        qb.push_bind(format_datetime(&Utc::now()));

        if let Some(status) = patch.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(output) = &patch.output {
            qb.push(", output = ").push_bind(to_json_text(output)?);
        }
        if let Some(error) = patch.error {
            qb.push(", error = ").push_bind(error);
        }
        if let Some(current_step_id) = patch.current_step_id {
            qb.push(", current_step_id = ").push_bind(current_step_id);
        }
        if let Some(retry_count) = patch.retry_count {
            qb.push(", retry_count = ").push_bind(retry_count as i64);
        }
        if let Some(next_retry_at) = patch.next_retry_at {
            qb.push(", next_retry_at = ")
                .push_bind(next_retry_at.map(|t| format_datetime(&t)));
        }
        if let Some(started_at) = patch.started_at {
            qb.push(", started_at = ").push_bind(format_datetime(&started_at));
        }
        if let Some(completed_at) = patch.completed_at {
            qb.push(", completed_at = ")
                .push_bind(format_datetime(&completed_at));
        }
        if let Some(worker_id) = patch.worker_id {
            qb.push(", worker_id = ").push_bind(worker_id);
        }
        if let Some(locked_at) = patch.locked_at {
            qb.push(", locked_at = ")
                .push_bind(locked_at.map(|t| format_datetime(&t)));
        }

        qb.push(" WHERE id = ").push_bind(id.to_string());

        let result = qb
            .build()
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Execution>, StoreError> {
        let row = sqlx::query("SELECT * FROM executions WHERE idempotency_key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = ExecutionRow::from_row(&row)
                    .map_err(|e| StoreError::Query(e.to_string()))?;
                Ok(Some(r.into_execution()?))
            }
            None => Ok(None),
        }
    }

    async fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<Execution>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM executions WHERE 1=1");
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(name) = &filter.workflow_name {
            qb.push(" AND workflow_name = ").push_bind(name.clone());
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit as i64);

        let rows = qb
            .build()
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut executions = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = ExecutionRow::from_row(row).map_err(|e| StoreError::Query(e.to_string()))?;
            executions.push(r.into_execution()?);
        }
        Ok(executions)
    }

    async fn cancel_execution(&self, id: &Uuid) -> Result<CancelOutcome, StoreError> {
        let now = format_datetime(&Utc::now());
        let result = sqlx::query(
            r#"UPDATE executions
                  SET status = 'cancelled',
                      completed_at = ?,
                      worker_id = NULL,
                      locked_at = NULL,
                      updated_at = ?
                WHERE id = ?
                  AND status NOT IN ('completed', 'failed', 'cancelled')"#,
        )
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        if result.rows_affected() > 0 {
            return Ok(CancelOutcome::Cancelled);
        }
        match self.get_execution(id).await? {
            Some(_) => Ok(CancelOutcome::Conflict),
            None => Err(StoreError::NotFound),
        }
    }

    async fn release_stale_locks(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"UPDATE executions
                  SET status = 'pending',
                      worker_id = NULL,
                      locked_at = NULL,
                      updated_at = ?
                WHERE status = 'running'
                  AND locked_at IS NOT NULL
                  AND locked_at < ?"#,
        )
        .bind(format_datetime(&Utc::now()))
        .bind(format_datetime(&older_than))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn append_step_result(&self, result: StepResult) -> Result<(), StoreError> {
        let output = result.output.as_ref().map(to_json_text).transpose()?;

        sqlx::query(
            r#"INSERT INTO step_results
               (id, execution_id, step_id, status, output, error, attempt,
                duration_ms, started_at, completed_at, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(result.id.to_string())
        .bind(result.execution_id.to_string())
        .bind(&result.step_id)
        .bind(result.status.as_str())
        .bind(&output)
        .bind(&result.error)
        .bind(result.attempt as i64)
        .bind(result.duration_ms as i64)
        .bind(format_datetime(&result.started_at))
        .bind(format_datetime(&result.completed_at))
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_step_results(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<StepResult>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM step_results WHERE execution_id = ? ORDER BY started_at ASC, attempt ASC",
        )
        .bind(execution_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = StepResultRow::from_row(row).map_err(|e| StoreError::Query(e.to_string()))?;
            results.push(r.into_step_result()?);
        }
        Ok(results)
    }

    async fn append_dlq(&self, entry: DlqEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO dlq_entries
               (id, execution_id, workflow_name, workflow_version, reason,
                last_error, total_attempts, input, last_step_id, failed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.execution_id.to_string())
        .bind(&entry.workflow_name)
        .bind(&entry.workflow_version)
        .bind(&entry.reason)
        .bind(&entry.last_error)
        .bind(entry.total_attempts as i64)
        .bind(to_json_text(&entry.input)?)
        .bind(&entry.last_step_id)
        .bind(format_datetime(&entry.failed_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_dlq(&self) -> Result<Vec<DlqEntry>, StoreError> {
        let rows = sqlx::query("SELECT * FROM dlq_entries ORDER BY failed_at DESC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let input: String = row
                .try_get("input")
                .map_err(|e| StoreError::Query(e.to_string()))?;
            entries.push(DlqEntry {
                id: parse_uuid(row.try_get::<String, _>("id").map_err(query_err)?.as_str())?,
                execution_id: parse_uuid(
                    row.try_get::<String, _>("execution_id")
                        .map_err(query_err)?
                        .as_str(),
                )?,
                workflow_name: row.try_get("workflow_name").map_err(query_err)?,
                workflow_version: row.try_get("workflow_version").map_err(query_err)?,
                reason: row.try_get("reason").map_err(query_err)?,
                last_error: row.try_get("last_error").map_err(query_err)?,
                total_attempts: row.try_get::<i64, _>("total_attempts").map_err(query_err)?
                    as u32,
                input: serde_json::from_str(&input)
                    .map_err(|e| StoreError::Query(format!("invalid DLQ input JSON: {e}")))?,
                last_step_id: row.try_get("last_step_id").map_err(query_err)?,
                failed_at: parse_datetime(
                    row.try_get::<String, _>("failed_at").map_err(query_err)?.as_str(),
                )?,
            });
        }
        Ok(entries)
    }

    async fn append_logs(&self, entries: Vec<ExecutionLogEntry>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        for entry in &entries {
            sqlx::query(
                r#"INSERT INTO execution_logs
                   (id, execution_id, step_id, level, message, timestamp)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(entry.id.to_string())
            .bind(entry.execution_id.to_string())
            .bind(&entry.step_id)
            .bind(&entry.level)
            .bind(&entry.message)
            .bind(format_datetime(&entry.timestamp))
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list_logs(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<ExecutionLogEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM execution_logs WHERE execution_id = ? ORDER BY timestamp ASC",
        )
        .bind(execution_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(ExecutionLogEntry {
                id: parse_uuid(row.try_get::<String, _>("id").map_err(query_err)?.as_str())?,
                execution_id: parse_uuid(
                    row.try_get::<String, _>("execution_id")
                        .map_err(query_err)?
                        .as_str(),
                )?,
                step_id: row.try_get("step_id").map_err(query_err)?,
                level: row.try_get("level").map_err(query_err)?,
                message: row.try_get("message").map_err(query_err)?,
                timestamp: parse_datetime(
                    row.try_get::<String, _>("timestamp").map_err(query_err)?.as_str(),
                )?,
            });
        }
        Ok(entries)
    }
}

fn query_err(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
