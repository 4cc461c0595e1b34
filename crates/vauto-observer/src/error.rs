//! Error types for the operator API.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vauto_core::StoreError;
use vauto_core::conveyor::ConveyorError;
use vauto_core::zones::ZoneError;
use vauto_world::WorldError;

/// Errors that can occur in the operator API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request conflicts with current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request was understood but refused.
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// A UUID could not be parsed from the request path.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// The plan store failed.
    #[error("plan store error: {0}")]
    Store(#[from] StoreError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ZoneError> for ObserverError {
    fn from(error: ZoneError) -> Self {
        let message = error.to_string();
        match error {
            ZoneError::PlanNotFound(_) | ZoneError::NotFound(_) => Self::NotFound(message),
            ZoneError::Duplicate(_) | ZoneError::Referenced(_) => Self::Conflict(message),
            ZoneError::Invalid { .. } | ZoneError::Denied { .. } => Self::Unprocessable(message),
        }
    }
}

impl From<ConveyorError> for ObserverError {
    fn from(error: ConveyorError) -> Self {
        let message = error.to_string();
        match error {
            ConveyorError::UnknownTerritory(_)
            | ConveyorError::World {
                source: WorldError::UnknownLocation(_),
            } => Self::NotFound(message),
            ConveyorError::Pattern { .. } | ConveyorError::World { .. } => Self::Internal(message),
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) | Self::InvalidUuid(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
