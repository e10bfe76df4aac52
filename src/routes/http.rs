// GET handlers: version, dashboard view, station detail

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::AppState;
use crate::error::TelemetryError;

/// GET /version — service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/dashboard — the view as of the last refresh cycle.
pub(super) async fn dashboard_handler(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.view_rx.borrow().clone();
    axum::Json(view)
}

/// GET /api/stations/{id} — single-station detail, fetched from the telemetry API on demand.
pub(super) async fn station_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.source.fetch_station(&id).await {
        Ok(detail) => axum::Json(detail).into_response(),
        Err(e @ TelemetryError::InvalidStationId(_)) => (
            StatusCode::BAD_REQUEST,
            axum::Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(
                error = %e,
                station = %id,
                operation = "fetch_station",
                "station lookup failed"
            );
            (
                StatusCode::BAD_GATEWAY,
                axum::Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
