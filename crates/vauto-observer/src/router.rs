//! Axum router construction for the operator API.
//!
//! Assembles every route into a single [`Router`] with CORS and request
//! tracing enabled.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{conveyor, handlers, operator, zones};

/// Build the complete Axum router for the operator API.
///
/// See the [`handlers`], [`zones`], [`conveyor`] and [`operator`] module
/// docs for the endpoint tables.
///
/// CORS is configured to allow any origin so plan-authoring tools served
/// from elsewhere can call the API.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health))
        // Plans
        .route(
            "/api/plans",
            get(handlers::list_plans).post(handlers::load_plan),
        )
        .route(
            "/api/plans/{id}",
            get(handlers::get_plan).delete(handlers::unload_plan),
        )
        .route("/api/plans/{id}/test", post(handlers::test_plan))
        .route("/api/plans/{id}/run", post(handlers::run_plan))
        .route("/api/plans/{id}/schedule", post(handlers::schedule_plan))
        .route("/api/plans/{id}/respawn", post(handlers::respawn_plan))
        // Zones
        .route(
            "/api/plans/{id}/zones",
            get(zones::list_zones).post(zones::create_zone),
        )
        .route(
            "/api/plans/{id}/zones/{zone}",
            get(zones::get_zone)
                .put(zones::update_zone)
                .delete(zones::delete_zone),
        )
        .route(
            "/api/plans/{id}/zones/{zone}/schematic",
            post(zones::save_schematic),
        )
        .route("/api/plans/{id}/zones/{zone}/enter", post(zones::enter_zone))
        .route("/api/plans/{id}/zones/{zone}/exit", post(zones::exit_zone))
        // Schedules and log
        .route("/api/schedules", get(handlers::list_schedules))
        .route(
            "/api/schedules/{event}",
            axum::routing::delete(handlers::cancel_schedule),
        )
        .route("/api/log", get(handlers::execution_log))
        // Conveyor
        .route("/api/conveyor", get(conveyor::list_territories))
        .route("/api/conveyor/{territory}/links", get(conveyor::links))
        .route("/api/conveyor/{territory}/enable", post(conveyor::enable))
        .route("/api/conveyor/{territory}/disable", post(conveyor::disable))
        .route("/api/conveyor/{territory}/sweep", post(conveyor::sweep))
        // Operator
        .route("/api/operator/pause", post(operator::pause))
        .route("/api/operator/resume", post(operator::resume))
        .route("/api/operator/speed", post(operator::set_speed))
        .route("/api/operator/status", get(operator::status))
        .route("/api/operator/tick", post(operator::tick))
        .route("/api/operator/stop", post(operator::stop))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
