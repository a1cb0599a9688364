//! Execution handlers: event submission, inspection, cancellation, DLQ.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use windlass_types::execution::{CancelOutcome, ExecutionFilter};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body for `POST /workflows/{name}/events`.
#[derive(Debug, Deserialize)]
pub struct SubmitEventBody {
    /// Trigger input payload; defaults to an empty object.
    #[serde(default)]
    pub input: serde_json::Value,
    /// Optional deduplication key.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitEventResponse {
    pub execution_id: Uuid,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the execution sub-router, mounted at `/api/v1`.
pub fn execution_routes() -> Router<AppState> {
    Router::new()
        .route("/workflows/{name}/events", post(submit_event))
        .route("/executions", get(list_executions))
        .route("/executions/{id}", get(get_execution))
        .route("/executions/{id}/cancel", post(cancel_execution))
        .route("/dlq", get(list_dlq))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/workflows/{name}/events - Accept a trigger event (202).
pub async fn submit_event(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<SubmitEventBody>,
) -> Result<(StatusCode, Json<ApiResponse<SubmitEventResponse>>), AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let receipt = state
        .service
        .submit_event(&name, body.input, body.idempotency_key)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        SubmitEventResponse {
            execution_id: receipt.execution_id,
            status: receipt.status.as_str().to_string(),
        },
        request_id,
        elapsed,
    )
    .with_link(
        "execution",
        &format!("/api/v1/executions/{}", receipt.execution_id),
    );

    Ok((StatusCode::ACCEPTED, Json(resp)))
}

/// GET /api/v1/executions - List executions with optional status filter.
pub async fn list_executions(
    State(state): State<AppState>,
    Query(filter): Query<ExecutionFilter>,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let executions = state.service.list_executions(&filter).await?;
    let rows: Vec<serde_json::Value> = executions
        .iter()
        .map(|e| serde_json::to_value(e).unwrap_or_default())
        .collect();

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(rows, request_id, elapsed)
        .with_link("self", "/api/v1/executions");

    Ok(Json(resp))
}

/// GET /api/v1/executions/{id} - Execution with step results and logs.
pub async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let detail = state.service.get_execution(id).await?;
    let body = serde_json::json!({
        "execution": detail.execution,
        "step_results": detail.step_results,
        "logs": detail.logs,
    });

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(body, request_id, elapsed)
        .with_link("self", &format!("/api/v1/executions/{id}"))
        .with_link("cancel", &format!("/api/v1/executions/{id}/cancel"));

    Ok(Json(resp))
}

/// POST /api/v1/executions/{id}/cancel - Request cancellation (409 when the
/// execution is already terminal).
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    match state.service.cancel(id).await? {
        CancelOutcome::Cancelled => {
            let elapsed = start.elapsed().as_millis() as u64;
            let resp = ApiResponse::success(
                serde_json::json!({"cancelled": true, "execution_id": id}),
                request_id,
                elapsed,
            );
            Ok(Json(resp))
        }
        CancelOutcome::Conflict => Err(AppError::Conflict(format!(
            "execution {id} is already in a terminal state"
        ))),
    }
}

/// GET /api/v1/dlq - Dead-letter entries, newest first.
pub async fn list_dlq(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let entries = state.service.list_dlq().await?;
    let rows: Vec<serde_json::Value> = entries
        .iter()
        .map(|e| serde_json::to_value(e).unwrap_or_default())
        .collect();

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(rows, request_id, elapsed).with_link("self", "/api/v1/dlq");

    Ok(Json(resp))
}
