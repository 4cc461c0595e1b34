//! Conveyor configuration handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/conveyor` | Every configured territory |
//! | `GET` | `/api/conveyor/{territory}/links` | Links discovered from labels |
//! | `POST` | `/api/conveyor/{territory}/enable` | Enable, optionally set the interval |
//! | `POST` | `/api/conveyor/{territory}/disable` | Disable |
//! | `POST` | `/api/conveyor/{territory}/sweep` | Sweep now |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use vauto_core::clock::Clock;

use crate::error::ObserverError;
use crate::state::AppState;

/// Request body for `POST /api/conveyor/{territory}/enable`.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableRequest {
    /// Seconds between sweeps. Keeps the current value when absent.
    pub update_interval_secs: Option<u64>,
}

/// Every configured territory with its last sweep.
pub async fn list_territories(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let territories = state.runtime.conveyor.territories();
    Json(serde_json::json!({
        "count": territories.len(),
        "territories": territories,
    }))
}

/// Links between a territory's inventories.
pub async fn links(
    State(state): State<Arc<AppState>>,
    Path(territory): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    Ok(Json(state.runtime.conveyor.links(&territory)?))
}

/// Enable a territory.
pub async fn enable(
    State(state): State<Arc<AppState>>,
    Path(territory): Path<String>,
    body: Option<Json<EnableRequest>>,
) -> Result<impl IntoResponse, ObserverError> {
    let conveyor = &state.runtime.conveyor;
    let Json(body) = body.unwrap_or_default();
    if body.update_interval_secs == Some(0) {
        return Err(ObserverError::BadRequest(
            "updateIntervalSecs must be at least 1".to_owned(),
        ));
    }
    conveyor.enable(&territory);
    if let Some(seconds) = body.update_interval_secs {
        conveyor.set_update_interval(&territory, seconds)?;
    }
    Ok(Json(serde_json::json!({
        "ok": true,
        "message": format!("Conveyor enabled for {territory}"),
    })))
}

/// Disable a territory.
pub async fn disable(
    State(state): State<Arc<AppState>>,
    Path(territory): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    if !state.runtime.conveyor.disable(&territory) {
        return Err(ObserverError::NotFound(format!(
            "Territory {territory} has no conveyor configuration"
        )));
    }
    Ok(Json(serde_json::json!({
        "ok": true,
        "message": format!("Conveyor disabled for {territory}"),
    })))
}

/// Sweep a territory immediately, enabled or not.
pub async fn sweep(
    State(state): State<Arc<AppState>>,
    Path(territory): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let now = state.runtime.clock.now();
    Ok(Json(state.runtime.conveyor.sweep(&territory, now)?))
}
