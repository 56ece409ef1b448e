pub mod config;
pub mod http;
pub mod ratelimit;
pub mod response;
pub mod state;

pub use state::AppState;

use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.allowed_origins);

    Router::new()
        .route("/api/relay", post(http::relay::dispatch))
        .route(
            "/api/v1/sessions",
            post(http::sessions::create),
        )
        .route("/api/v1/sessions/resolve", get(http::sessions::resolve))
        .route(
            "/api/v1/sessions/:session_id/offer",
            post(http::sessions::post_offer).get(http::sessions::get_offer),
        )
        .route(
            "/api/v1/sessions/:session_id/answer",
            post(http::sessions::post_answer).get(http::sessions::get_answer),
        )
        .route(
            "/api/v1/sessions/:session_id",
            delete(http::sessions::delete),
        )
        .route("/api/v1/edition", get(http::edition::get_edition))
        .route("/health", get(http::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any);

    if allowed_origins.is_empty() {
        layer.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
