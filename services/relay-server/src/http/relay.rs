//! `POST /api/relay` — the unified action dispatcher (§6). One request shape
//! per `action`, frozen by `relay-protocol`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_core::ServiceError;
use relay_protocol::{
    error_codes, AckRequest, AckStatusRequest, HttpErrorEnvelope, LookupRequest, PollRequest,
    ReceiveRequest, RegisterRequest, RelayRequestEnvelope, SendRequest, SignalRequest,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::response::map_service_error;
use crate::state::AppState;

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, Response> {
    serde_json::from_value(body).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(HttpErrorEnvelope::new(error_codes::MISSING_FIELDS)),
        )
            .into_response()
    })
}

pub async fn dispatch(
    State(state): State<AppState>,
    Json(envelope): Json<RelayRequestEnvelope>,
) -> Response {
    let Some(action) = envelope.action.as_deref() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(HttpErrorEnvelope::new(error_codes::MISSING_ACTION)),
        )
            .into_response();
    };

    match action {
        "send" => send(state, envelope.body).await,
        "receive" => receive(state, envelope.body).await,
        "ack" => ack(state, envelope.body).await,
        "ack-status" => ack_status(state, envelope.body).await,
        "register" => register(state, envelope.body).await,
        "lookup" => lookup(state, envelope.body).await,
        "signal" => signal(state, envelope.body).await,
        "poll" => poll(state, envelope.body).await,
        _ => (
            StatusCode::NOT_FOUND,
            Json(HttpErrorEnvelope::new(error_codes::UNKNOWN_ACTION)),
        )
            .into_response(),
    }
}

/// `send` keeps the legacy contract: a deterministic state conflict
/// (`totalChunks_mismatch`, `duplicate_chunk`) or an exhausted CAS retry
/// budget (`concurrency_conflict`) is surfaced as `200 {"error", "status":
/// "waiting"}` rather than a 4xx/5xx, so application-level clients can poll
/// through it without special-casing HTTP status.
async fn send(state: AppState, body: Value) -> Response {
    let req: SendRequest = match parse_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };

    match state
        .service
        .send(&req.pin, &req.password_hash, req.chunk_index, req.total_chunks, &req.data)
        .await
    {
        Ok(resp) => Json(resp).into_response(),
        Err(err @ (ServiceError::TotalChunksMismatch
        | ServiceError::DuplicateChunk
        | ServiceError::ConcurrencyConflict)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "error": err.code(), "status": "waiting" })),
        )
            .into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

async fn receive(state: AppState, body: Value) -> Response {
    let req: ReceiveRequest = match parse_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.service.receive(&req.pin, &req.password_hash).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

async fn ack(state: AppState, body: Value) -> Response {
    let req: AckRequest = match parse_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.service.ack(&req.pin, &req.password_hash).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

async fn ack_status(state: AppState, body: Value) -> Response {
    let req: AckStatusRequest = match parse_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.service.ack_status(&req.pin, &req.password_hash).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

async fn register(state: AppState, body: Value) -> Response {
    let req: RegisterRequest = match parse_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.service.register(&req.invite_code, &req.peer_id).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

async fn lookup(state: AppState, body: Value) -> Response {
    let req: LookupRequest = match parse_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.service.lookup(&req.invite_code).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

async fn signal(state: AppState, body: Value) -> Response {
    let req: SignalRequest = match parse_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.service.signal(&req.from, &req.to, &req.kind, req.payload).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}

async fn poll(state: AppState, body: Value) -> Response {
    let req: PollRequest = match parse_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    match state.service.poll(&req.peer_id).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => map_service_error(err).into_response(),
    }
}
