// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::models::Utilization;
use crate::monitor::ResourceMonitor;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) monitor: Arc<ResourceMonitor>,
    pub(crate) utilization_tx: broadcast::Sender<Utilization>,
    pub(crate) ws_clients: Arc<AtomicUsize>,
}

pub fn app(
    monitor: Arc<ResourceMonitor>,
    utilization_tx: broadcast::Sender<Utilization>,
    ws_clients: Arc<AtomicUsize>,
) -> Router {
    let state = AppState {
        monitor,
        utilization_tx,
        ws_clients,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/resources", get(http::resources_handler)) // GET /api/resources
        .route("/api/utilization", get(http::utilization_handler)) // GET /api/utilization?windowMs=
        .route("/ws/utilization", get(ws::ws_utilization)) // WS /ws/utilization
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
