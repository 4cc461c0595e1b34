//! REST handlers for plans, schedules and the execution log.
//!
//! Engine operations return an [`ExecutionResult`] whatever happens. The
//! handlers always send that record back and pick the status code from it:
//! `200` on success, `404` when the plan is not loaded, `422` otherwise.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/health` | Liveness, plan count and loop status |
//! | `GET` | `/api/plans` | List loaded plans |
//! | `POST` | `/api/plans` | Validate and load a plan |
//! | `GET` | `/api/plans/{id}` | Full plan definition |
//! | `DELETE` | `/api/plans/{id}` | Unload a plan |
//! | `POST` | `/api/plans/{id}/test` | Dry run |
//! | `POST` | `/api/plans/{id}/run` | Live run |
//! | `POST` | `/api/plans/{id}/schedule` | Schedule a live run |
//! | `POST` | `/api/plans/{id}/respawn` | Respawn every boss |
//! | `GET` | `/api/schedules` | Pending events and active respawns |
//! | `DELETE` | `/api/schedules/{event}` | Cancel a pending event |
//! | `GET` | `/api/log` | Execution log |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;
use vauto_types::{CallerId, ExecutionResult, Plan, PlanId, ScheduledEventId};

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / query types
// ---------------------------------------------------------------------------

/// Request body naming the acting player.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerRequest {
    /// Platform id of the caller. Zero is rejected by the gate.
    pub caller_id: u64,
}

/// Request body for `POST /api/plans/{id}/test`.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    /// Platform id of the caller.
    pub caller_id: u64,
    /// Attach a visualization snapshot. Defaults to the configured value.
    pub visualize: Option<bool>,
}

/// Request body for `POST /api/plans/{id}/schedule`.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    /// Platform id of the caller.
    pub caller_id: u64,
    /// When to run, RFC 3339.
    pub execute_at: DateTime<Utc>,
}

/// Query parameters filtering by plan.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFilter {
    /// Only records of this plan.
    pub plan_id: Option<String>,
}

/// Query parameters for `GET /api/log`.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    /// Only entries of this plan.
    pub plan_id: Option<String>,
    /// Most recent entries to return (default 100).
    pub limit: Option<usize>,
}

/// Turn an engine result into a response.
fn respond(state: &AppState, plan_id: &str, result: ExecutionResult) -> impl IntoResponse + use<> {
    let status = if result.success {
        StatusCode::OK
    } else if state.runtime.engine.get_plan(plan_id).is_none() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(result))
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

/// Liveness check with a summary of what the engine holds.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let runtime = &state.runtime;
    Json(serde_json::json!({
        "status": "ok",
        "plans": runtime.engine.list_plans().len(),
        "pendingEvents": runtime.scheduler.active_schedules(None).len(),
        "activeRespawns": runtime.scheduler.active_respawn_schedules(None).len(),
        "runtime": runtime.control.status(),
    }))
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// List loaded plans.
pub async fn list_plans(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let plans = state.runtime.engine.list_plans();
    Json(serde_json::json!({
        "count": plans.len(),
        "plans": plans,
    }))
}

/// Validate and load a plan, replacing any plan with the same id.
///
/// Accepted plans are persisted. A rejected plan answers `422` with the
/// full validation report, or `400` when the id is empty.
pub async fn load_plan(
    State(state): State<Arc<AppState>>,
    Json(plan): Json<Plan>,
) -> impl IntoResponse {
    let plan_id = plan.plan_id.clone();
    let result = state.runtime.engine.load(plan);
    let status = if result.success {
        state.persist(plan_id.as_str());
        StatusCode::OK
    } else if plan_id.is_blank() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(result))
}

/// Full definition of a loaded plan.
pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let plan = state
        .runtime
        .engine
        .get_plan(&plan_id)
        .ok_or_else(|| ObserverError::NotFound(format!("Plan '{plan_id}' not found")))?;
    let phase = state.runtime.engine.phase(&plan_id);
    Ok(Json(serde_json::json!({
        "phase": phase,
        "plan": plan,
    })))
}

/// Unload a plan and drop it from the store.
pub async fn unload_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
) -> impl IntoResponse {
    let result = state.runtime.engine.unload(&plan_id);
    if result.success {
        state.forget(&plan_id);
    }
    respond(&state, &plan_id, result)
}

/// Dry-run a plan.
pub async fn test_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
    Json(body): Json<TestRequest>,
) -> impl IntoResponse {
    let result = state
        .runtime
        .engine
        .test(&plan_id, CallerId(body.caller_id), body.visualize);
    respond(&state, &plan_id, result)
}

/// Run a plan live.
pub async fn run_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
    Json(body): Json<CallerRequest>,
) -> impl IntoResponse {
    let result = state.runtime.engine.run(&plan_id, CallerId(body.caller_id));
    respond(&state, &plan_id, result)
}

/// Schedule a live run.
pub async fn schedule_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
    Json(body): Json<ScheduleRequest>,
) -> impl IntoResponse {
    let result =
        state
            .runtime
            .engine
            .schedule_plan(&plan_id, body.execute_at, CallerId(body.caller_id));
    respond(&state, &plan_id, result)
}

/// Respawn every boss of a plan now.
pub async fn respawn_plan(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
    Json(body): Json<CallerRequest>,
) -> impl IntoResponse {
    let result = state
        .runtime
        .engine
        .respawn(&plan_id, CallerId(body.caller_id));
    respond(&state, &plan_id, result)
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

/// Pending one-shot events and active respawn schedules.
pub async fn list_schedules(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PlanFilter>,
) -> impl IntoResponse {
    let plan_id = filter.plan_id.map(PlanId::new);
    let scheduler = &state.runtime.scheduler;
    Json(serde_json::json!({
        "events": scheduler.active_schedules(plan_id.as_ref()),
        "respawns": scheduler.active_respawn_schedules(plan_id.as_ref()),
    }))
}

/// Cancel a pending event.
pub async fn cancel_schedule(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let event_id = parse_event_id(&event_id)?;
    if !state.runtime.scheduler.cancel_scheduled_event(event_id) {
        return Err(ObserverError::NotFound(format!(
            "No pending scheduled event {event_id}"
        )));
    }
    info!(%event_id, "Scheduled event cancelled by operator");
    Ok(Json(serde_json::json!({
        "ok": true,
        "message": format!("Scheduled event {event_id} cancelled"),
    })))
}

fn parse_event_id(s: &str) -> Result<ScheduledEventId, ObserverError> {
    Uuid::parse_str(s)
        .map(ScheduledEventId::from)
        .map_err(|e| ObserverError::InvalidUuid(format!("{s}: {e}")))
}

// ---------------------------------------------------------------------------
// GET /api/log
// ---------------------------------------------------------------------------

/// The most recent execution log entries, oldest first.
pub async fn execution_log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(100);
    let entries = state.runtime.engine.execution_log(query.plan_id.as_deref());
    let skip = entries.len().saturating_sub(limit);
    let entries: Vec<_> = entries.into_iter().skip(skip).collect();
    Json(serde_json::json!({
        "count": entries.len(),
        "entries": entries,
    }))
}
