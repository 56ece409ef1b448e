use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use relay_protocol::EditionResponse;

use crate::state::AppState;

/// Static per-process edition info, built from `RELAY_EDITION` at startup.
/// Publishes the dynamic chunk-TTL bounds so clients can reason about
/// worst-case delivery windows without hardcoding the formula.
pub async fn get_edition(State(state): State<AppState>) -> impl IntoResponse {
    let features = serde_json::json!({
        "chunkTtlFormula": "60s + 0.5s * totalChunks, capped at 180s",
        "chunkTtlMinSec": 60,
        "chunkTtlMaxSec": 180,
        "deviceRegistry": state.config.is_enterprise(),
        "auditLogging": state.config.is_enterprise(),
    });

    Json(EditionResponse {
        edition: state.config.edition.clone(),
        is_enterprise: state.config.is_enterprise(),
        features,
        timestamp: Utc::now().to_rfc3339(),
    })
}
