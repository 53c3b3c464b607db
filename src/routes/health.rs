use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub llm_enabled: bool,
    pub image_host_configured: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    info!("GET /health - Health check");
    Json(HealthStatus {
        status: "OK",
        llm_enabled: state.llm_service.is_enabled(),
        image_host_configured: state.image_host.is_some(),
    })
}
