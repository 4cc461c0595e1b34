//! Zone editing and player transition handlers.
//!
//! Edits change the loaded plan in place and are persisted like a reload.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/plans/{id}/zones` | List zones |
//! | `POST` | `/api/plans/{id}/zones` | Add a zone |
//! | `GET` | `/api/plans/{id}/zones/{zone}` | One zone |
//! | `PUT` | `/api/plans/{id}/zones/{zone}` | Replace a zone |
//! | `DELETE` | `/api/plans/{id}/zones/{zone}` | Remove a zone |
//! | `POST` | `/api/plans/{id}/zones/{zone}/schematic` | Attach a saved layout |
//! | `POST` | `/api/plans/{id}/zones/{zone}/enter` | Apply entry effects |
//! | `POST` | `/api/plans/{id}/zones/{zone}/exit` | Apply exit effects |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use vauto_types::{CallerId, Zone};

use crate::error::ObserverError;
use crate::handlers::CallerRequest;
use crate::state::AppState;

/// Request body for `POST /api/plans/{id}/zones/{zone}/schematic`.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchematicRequest {
    /// Id of the saved layout.
    pub schematic_id: String,
}

/// List a plan's zones.
pub async fn list_zones(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    Ok(Json(state.runtime.engine.list_zones(&plan_id)?))
}

/// Add a zone to a plan.
pub async fn create_zone(
    State(state): State<Arc<AppState>>,
    Path(plan_id): Path<String>,
    Json(zone): Json<Zone>,
) -> Result<impl IntoResponse, ObserverError> {
    let zone_id = zone.zone_id.clone();
    state.runtime.engine.create_zone(&plan_id, zone)?;
    state.persist(&plan_id);
    let zone = state.runtime.engine.get_zone(&plan_id, zone_id.as_str())?;
    Ok((StatusCode::CREATED, Json(zone)))
}

/// One zone of a plan.
pub async fn get_zone(
    State(state): State<Arc<AppState>>,
    Path((plan_id, zone_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ObserverError> {
    Ok(Json(state.runtime.engine.get_zone(&plan_id, &zone_id)?))
}

/// Replace a zone.
pub async fn update_zone(
    State(state): State<Arc<AppState>>,
    Path((plan_id, zone_id)): Path<(String, String)>,
    Json(zone): Json<Zone>,
) -> Result<impl IntoResponse, ObserverError> {
    let new_id = zone.zone_id.clone();
    state.runtime.engine.update_zone(&plan_id, &zone_id, zone)?;
    state.persist(&plan_id);
    Ok(Json(state.runtime.engine.get_zone(&plan_id, new_id.as_str())?))
}

/// Remove a zone. Refused while a castle record references it.
pub async fn delete_zone(
    State(state): State<Arc<AppState>>,
    Path((plan_id, zone_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ObserverError> {
    let removed = state.runtime.engine.delete_zone(&plan_id, &zone_id)?;
    state.persist(&plan_id);
    Ok(Json(serde_json::json!({
        "ok": true,
        "message": format!("Zone {} deleted", removed.display_name()),
    })))
}

/// Point a zone at a saved layout and enable it.
pub async fn save_schematic(
    State(state): State<Arc<AppState>>,
    Path((plan_id, zone_id)): Path<(String, String)>,
    Json(body): Json<SchematicRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    state
        .runtime
        .engine
        .save_zone_schematic(&plan_id, &zone_id, &body.schematic_id)?;
    state.persist(&plan_id);
    Ok(Json(state.runtime.engine.get_zone(&plan_id, &zone_id)?))
}

/// Apply a zone's entry effects to a player.
pub async fn enter_zone(
    State(state): State<Arc<AppState>>,
    Path((plan_id, zone_id)): Path<(String, String)>,
    Json(body): Json<CallerRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let report = state
        .runtime
        .engine
        .enter_zone(&plan_id, &zone_id, CallerId(body.caller_id))?;
    Ok(Json(report))
}

/// Apply a zone's exit effects to a player.
pub async fn exit_zone(
    State(state): State<Arc<AppState>>,
    Path((plan_id, zone_id)): Path<(String, String)>,
    Json(body): Json<CallerRequest>,
) -> Result<impl IntoResponse, ObserverError> {
    let report = state
        .runtime
        .engine
        .exit_zone(&plan_id, &zone_id, CallerId(body.caller_id))?;
    Ok(Json(report))
}
