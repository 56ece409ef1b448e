//! `/api/v1/sessions` — the WebRTC envelope handshake REST surface (§4).

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_protocol::{
    error_codes, EnvelopeRequest, HttpErrorEnvelope, OkResponse, ResolvePinQuery,
};
use uuid::Uuid;

use crate::response::map_service_error;
use crate::state::AppState;

fn invalid_session_id() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(HttpErrorEnvelope::new(error_codes::SESSION_NOT_FOUND)),
    )
        .into_response()
}

fn parse_session_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw).map_err(|_| invalid_session_id())
}

pub async fn create(State(state): State<AppState>) -> Response {
    match state.service.create_session().await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

/// Rate-limited by caller IP: PIN resolution is the one endpoint in this
/// surface an attacker could brute-force against the 6-digit keyspace.
pub async fn resolve(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<ResolvePinQuery>,
) -> Response {
    if !state.resolve_limiter.allow(addr.ip()) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(HttpErrorEnvelope::new(error_codes::RATE_LIMITED)),
        )
            .into_response();
    }

    match state.service.resolve_pin(&query.pin).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

pub async fn post_offer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<EnvelopeRequest>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.service.post_offer(session_id, req.envelope).await {
        Ok(()) => Json(OkResponse { ok: true }).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

pub async fn get_offer(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.service.get_offer(session_id).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

pub async fn post_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<EnvelopeRequest>,
) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.service.post_answer(session_id, req.envelope).await {
        Ok(()) => Json(OkResponse { ok: true }).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

/// One-shot delivery: the engine force-expires the session the instant this
/// call first succeeds, so a retried or late second call observes
/// `session_expired`, not a repeat of the answer.
pub async fn get_answer(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.service.get_answer(session_id).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

pub async fn delete(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.service.delete_session(session_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}
