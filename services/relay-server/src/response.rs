use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_core::ServiceError;
use relay_protocol::HttpErrorEnvelope;
use tracing::warn;

pub type HttpResult<T> = Result<T, HttpResponse>;
pub struct HttpResponse(pub StatusCode, pub HttpErrorEnvelope);

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

fn error_response(status: StatusCode, code: &str) -> HttpResponse {
    HttpResponse(status, HttpErrorEnvelope::new(code))
}

/// Maps the engine's HTTP-agnostic [`ServiceError`] to `(status, body)` per
/// the frozen error taxonomy. `concurrency_conflict` on the `send` action
/// uses the legacy 200-with-error contract (see `http::relay::send`), so
/// this mapping is only reached for genuinely non-2xx outcomes.
pub fn map_service_error(err: ServiceError) -> HttpResponse {
    let code = err.code();
    match &err {
        ServiceError::MissingFields
        | ServiceError::InvalidChunk
        | ServiceError::InvalidEnvelope
        | ServiceError::InvalidInviteCode
        | ServiceError::MissingPinOrPasswordHash
        | ServiceError::MissingInviteCode
        | ServiceError::MissingPeerId
        | ServiceError::InvalidSignalType => error_response(StatusCode::BAD_REQUEST, code),

        ServiceError::OfferAlreadySet
        | ServiceError::AnswerAlreadySet
        | ServiceError::OfferNotSet
        | ServiceError::AnswerNotSet
        | ServiceError::InviteCodeInUse
        | ServiceError::TotalChunksMismatch
        | ServiceError::DuplicateChunk => error_response(StatusCode::CONFLICT, code),

        ServiceError::PinNotFound | ServiceError::PeerNotFound | ServiceError::SessionNotFound => {
            error_response(StatusCode::NOT_FOUND, code)
        }

        ServiceError::PinExpired | ServiceError::SessionExpired => {
            error_response(StatusCode::GONE, code)
        }

        ServiceError::PayloadTooLarge => error_response(StatusCode::PAYLOAD_TOO_LARGE, code),
        ServiceError::ConcurrencyConflict => error_response(StatusCode::OK, code),

        ServiceError::Internal(message) => {
            warn!(error = %message, "internal service error");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, relay_protocol::error_codes::INTERNAL_ERROR)
        }
    }
}
