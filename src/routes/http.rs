// GET handlers: version, api/resources, api/utilization

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::time::Duration;

use super::AppState;
use crate::error::UtilizationError;
use crate::version::{DESCRIPTION, NAME, VERSION};

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
        "description": DESCRIPTION,
    }))
}

/// GET /api/resources: host capacity the fractions are relative to.
pub(super) async fn resources_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.monitor.resources())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UtilizationQuery {
    window_ms: u64,
}

/// GET /api/utilization?windowMs=N: 400 for a bad window, 503 until enough data exists.
pub(super) async fn utilization_handler(
    State(state): State<AppState>,
    Query(query): Query<UtilizationQuery>,
) -> Response {
    match state
        .monitor
        .get_utilization(Duration::from_millis(query.window_ms))
    {
        Ok(utilization) => axum::Json(utilization).into_response(),
        Err(e) => {
            let status = match e {
                UtilizationError::WindowOutOfRange { .. } => StatusCode::BAD_REQUEST,
                UtilizationError::InsufficientData { .. } => StatusCode::SERVICE_UNAVAILABLE,
            };
            let body = serde_json::json!({
                "error": e.to_string(),
                "kind": e.kind(),
                "retryable": e.is_retryable(),
            });
            (status, axum::Json(body)).into_response()
        }
    }
}
