//! CLI command handlers for executions. All commands talk to the service
//! directly through [`AppState`], not over HTTP.

use uuid::Uuid;
use windlass_types::execution::{CancelOutcome, ExecutionFilter, ExecutionStatus};

use crate::state::AppState;

/// `windlass submit <workflow> [--input JSON] [--idempotency-key KEY]`
pub async fn submit(
    state: &AppState,
    workflow: &str,
    input: Option<&str>,
    idempotency_key: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let input: serde_json::Value = match input {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| anyhow::anyhow!("--input is not valid JSON: {e}"))?,
        None => serde_json::json!({}),
    };

    let receipt = state
        .service
        .submit_event(workflow, input, idempotency_key)
        .await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "execution_id": receipt.execution_id,
                "status": receipt.status.as_str(),
            })
        );
    } else {
        println!(
            "accepted: execution {} ({})",
            receipt.execution_id,
            receipt.status.as_str()
        );
    }
    Ok(())
}

/// `windlass list [--status STATUS] [--limit N]`
pub async fn list(
    state: &AppState,
    status: Option<&str>,
    limit: u32,
    json: bool,
) -> anyhow::Result<()> {
    let status = status
        .map(|s| {
            ExecutionStatus::parse(s).ok_or_else(|| anyhow::anyhow!("unknown status '{s}'"))
        })
        .transpose()?;

    let executions = state
        .service
        .list_executions(&ExecutionFilter {
            status,
            workflow_name: None,
            limit,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&executions)?);
        return Ok(());
    }

    if executions.is_empty() {
        println!("no executions");
        return Ok(());
    }
    for execution in &executions {
        println!(
            "{}  {:<16}  {}@{}  step={}  retries={}",
            execution.id,
            execution.status.as_str(),
            execution.workflow_name,
            execution.workflow_version,
            execution.current_step_id.as_deref().unwrap_or("-"),
            execution.retry_count,
        );
    }
    Ok(())
}

/// `windlass show <execution-id>`
pub async fn show(state: &AppState, execution_id: Uuid, json: bool) -> anyhow::Result<()> {
    let detail = state.service.get_execution(execution_id).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "execution": detail.execution,
                "step_results": detail.step_results,
                "logs": detail.logs,
            }))?
        );
        return Ok(());
    }

    let execution = &detail.execution;
    println!(
        "{} {}@{} [{}]",
        execution.id,
        execution.workflow_name,
        execution.workflow_version,
        execution.status.as_str()
    );
    if let Some(error) = &execution.error {
        println!("  error: {error}");
    }
    println!("  created: {}", execution.created_at.to_rfc3339());
    if let Some(at) = execution.completed_at {
        println!("  completed: {}", at.to_rfc3339());
    }

    if !detail.step_results.is_empty() {
        println!("  steps:");
        for result in &detail.step_results {
            println!(
                "    {} attempt={} {} ({}ms){}",
                result.step_id,
                result.attempt,
                result.status.as_str(),
                result.duration_ms,
                result
                    .error
                    .as_deref()
                    .map(|e| format!(" error: {e}"))
                    .unwrap_or_default(),
            );
        }
    }
    if !detail.logs.is_empty() {
        println!("  logs:");
        for log in &detail.logs {
            println!(
                "    [{}] {} {}",
                log.level,
                log.step_id.as_deref().unwrap_or("-"),
                log.message
            );
        }
    }
    Ok(())
}

/// `windlass cancel <execution-id>`
pub async fn cancel(state: &AppState, execution_id: Uuid, json: bool) -> anyhow::Result<()> {
    let outcome = state.service.cancel(execution_id).await?;
    let cancelled = outcome == CancelOutcome::Cancelled;

    if json {
        println!(
            "{}",
            serde_json::json!({"execution_id": execution_id, "cancelled": cancelled})
        );
    } else if cancelled {
        println!("cancelled {execution_id}");
    } else {
        println!("conflict: execution {execution_id} is already terminal");
    }
    Ok(())
}

/// `windlass dlq`
pub async fn dlq(state: &AppState, json: bool) -> anyhow::Result<()> {
    let entries = state.service.list_dlq().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("dead-letter queue is empty");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{}  execution={}  {}@{}  attempts={}  step={}  {}",
            entry.failed_at.to_rfc3339(),
            entry.execution_id,
            entry.workflow_name,
            entry.workflow_version,
            entry.total_attempts,
            entry.last_step_id.as_deref().unwrap_or("-"),
            entry.last_error.as_deref().unwrap_or(&entry.reason),
        );
    }
    Ok(())
}

/// `windlass sweep`
pub async fn sweep(state: &AppState, json: bool) -> anyhow::Result<()> {
    let released = state.service.release_stale_locks().await?;
    if json {
        println!("{}", serde_json::json!({"released": released}));
    } else {
        println!("released {released} stale claim(s)");
    }
    Ok(())
}
