// HTTP + WebSocket routes for dashboard clients

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use crate::models::DashboardView;
use crate::source::TelemetrySource;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) view_rx: watch::Receiver<DashboardView>,
    pub(crate) source: Arc<dyn TelemetrySource>,
}

pub fn app(view_rx: watch::Receiver<DashboardView>, source: Arc<dyn TelemetrySource>) -> Router {
    let state = AppState { view_rx, source };
    Router::new()
        .route("/", get(|| async { "solarwatch: solar station telemetry" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/dashboard", get(http::dashboard_handler)) // GET /api/dashboard
        .route("/api/stations/{id}", get(http::station_handler)) // GET /api/stations/{id}
        .route("/ws/dashboard", get(ws::ws_dashboard)) // WS /ws/dashboard
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
