//! Operator REST API handlers for background loop control.
//!
//! These endpoints drive the shared [`RuntimeControl`]: the scheduler and
//! conveyor loops observe it between ticks.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/operator/pause` | Pause both loops |
//! | `POST` | `/api/operator/resume` | Resume both loops |
//! | `POST` | `/api/operator/speed` | Set the scheduler tick interval (ms) |
//! | `GET` | `/api/operator/status` | Current loop status |
//! | `POST` | `/api/operator/tick` | Process due schedules now |
//! | `POST` | `/api/operator/stop` | Trigger clean shutdown |
//!
//! [`RuntimeControl`]: vauto_core::control::RuntimeControl

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use tracing::info;
use vauto_core::control::MIN_TICK_INTERVAL_MS;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/operator/speed`.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSpeedRequest {
    /// New tick interval in milliseconds (minimum 100).
    pub tick_interval_ms: u64,
}

/// Generic success response.
#[derive(Debug, serde::Serialize)]
struct OperatorResponse {
    /// Whether the operation succeeded.
    ok: bool,
    /// Human-readable message.
    message: String,
}

// ---------------------------------------------------------------------------
// POST /api/operator/pause
// ---------------------------------------------------------------------------

/// Pause the scheduler and conveyor loops after their current tick.
///
/// Pending events stay queued and fire on the first tick after resume.
pub async fn pause(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.runtime.control.pause();
    info!("Loops paused by operator");
    Json(OperatorResponse {
        ok: true,
        message: "Loops paused".to_owned(),
    })
}

// ---------------------------------------------------------------------------
// POST /api/operator/resume
// ---------------------------------------------------------------------------

/// Resume the loops after a pause.
pub async fn resume(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.runtime.control.resume();
    info!("Loops resumed by operator");
    Json(OperatorResponse {
        ok: true,
        message: "Loops resumed".to_owned(),
    })
}

// ---------------------------------------------------------------------------
// POST /api/operator/speed
// ---------------------------------------------------------------------------

/// Change the scheduler tick interval at runtime.
///
/// Takes effect before the next sleep.
pub async fn set_speed(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetSpeedRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    state
        .runtime
        .control
        .set_tick_interval_ms(body.tick_interval_ms)
        .map_or_else(
            || {
                Err(ObserverError::BadRequest(format!(
                    "tickIntervalMs must be at least {MIN_TICK_INTERVAL_MS}"
                )))
            },
            |prev| {
                Ok(Json(serde_json::json!({
                    "ok": true,
                    "message": format!(
                        "Tick interval changed from {}ms to {}ms",
                        prev, body.tick_interval_ms
                    ),
                    "previousIntervalMs": prev,
                    "newIntervalMs": body.tick_interval_ms,
                })))
            },
        )
}

// ---------------------------------------------------------------------------
// GET /api/operator/status
// ---------------------------------------------------------------------------

/// Loop status: pause and stop flags, interval, tick count and uptime.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.runtime.control.status())
}

// ---------------------------------------------------------------------------
// POST /api/operator/tick
// ---------------------------------------------------------------------------

/// Process due events and respawns immediately, outside the loop.
pub async fn tick(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let summary = state.runtime.scheduler.process_scheduled_events();
    info!(?summary, "Manual scheduler tick");
    Json(summary)
}

// ---------------------------------------------------------------------------
// POST /api/operator/stop
// ---------------------------------------------------------------------------

/// Trigger a clean shutdown.
///
/// Both loops finish their current iteration and exit; the HTTP server
/// drains in-flight requests and stops.
pub async fn stop(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.runtime.control.request_stop();
    info!("Stop requested by operator");
    Json(OperatorResponse {
        ok: true,
        message: "Stop requested -- loops will end after the current tick".to_owned(),
    })
}
