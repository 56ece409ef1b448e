use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use relay_protocol::HealthResponse;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        edition: state.config.edition.clone(),
        uptime: state.uptime_secs(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
