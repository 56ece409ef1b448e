// relay-protocol: wire types for the signaling relay's HTTP surface.
//
// Two surfaces share this crate: the action-dispatched `/api/relay` endpoint
// (one request shape per `action`, tagged on the `action` field) and the REST
// envelope-session surface under `/api/v1/sessions`. Both are frozen wire
// contracts — field names and casing here are load-bearing.

use serde::{Deserialize, Serialize};

pub mod error_codes {
    pub const MISSING_ACTION: &str = "missing_action";
    pub const MISSING_FIELDS: &str = "missing_fields";
    pub const INVALID_CHUNK: &str = "invalid_chunk";
    pub const INVALID_ENVELOPE: &str = "invalid_envelope";
    pub const INVALID_INVITE_CODE: &str = "invalid_invite_code";
    pub const MISSING_PIN_OR_PASSWORD_HASH: &str = "missing_pin_or_passwordHash";
    pub const MISSING_INVITE_CODE: &str = "missing_invite_code";
    pub const MISSING_PEER_ID: &str = "missing_peer_id";
    pub const OFFER_ALREADY_SET: &str = "offer_already_set";
    pub const ANSWER_ALREADY_SET: &str = "answer_already_set";
    pub const OFFER_NOT_SET: &str = "offer_not_set";
    pub const ANSWER_NOT_SET: &str = "answer_not_set";
    pub const INVITE_CODE_IN_USE: &str = "invite_code_in_use";
    pub const TOTAL_CHUNKS_MISMATCH: &str = "totalChunks_mismatch";
    pub const DUPLICATE_CHUNK: &str = "duplicate_chunk";
    pub const INVALID_SIGNAL_TYPE: &str = "invalid_signal_type";
    pub const PIN_NOT_FOUND: &str = "pin_not_found";
    pub const PEER_NOT_FOUND: &str = "peer_not_found";
    pub const SESSION_NOT_FOUND: &str = "session_not_found";
    pub const PIN_EXPIRED: &str = "pin_expired";
    pub const SESSION_EXPIRED: &str = "session_expired";
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const CONCURRENCY_CONFLICT: &str = "concurrency_conflict";
    pub const SERVER_ERROR: &str = "server_error";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const METHOD_NOT_ALLOWED: &str = "method_not_allowed";
    pub const UNKNOWN_ACTION: &str = "unknown_action";
}

/// Frozen HTTP error envelope used by all non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HttpErrorEnvelope {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            error: code.into(),
            message: None,
        }
    }

    pub fn with_message(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: code.into(),
            message: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/relay — action-dispatched requests
// ---------------------------------------------------------------------------

/// Raw dispatch envelope: `relay-server` peeks at `action` before deciding
/// which typed request to deserialize into, since the field sets differ.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayRequestEnvelope {
    pub action: Option<String>,
    #[serde(flatten)]
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SendRequest {
    pub pin: String,
    #[serde(rename = "passwordHash")]
    pub password_hash: String,
    #[serde(rename = "chunkIndex")]
    pub chunk_index: i64,
    #[serde(rename = "totalChunks")]
    pub total_chunks: i64,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReceiveRequest {
    pub pin: String,
    #[serde(rename = "passwordHash")]
    pub password_hash: String,
}

pub type AckRequest = ReceiveRequest;
pub type AckStatusRequest = ReceiveRequest;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "inviteCode")]
    pub invite_code: String,
    #[serde(rename = "peerId")]
    pub peer_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LookupRequest {
    #[serde(rename = "inviteCode")]
    pub invite_code: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignalRequest {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PollRequest {
    #[serde(rename = "peerId")]
    pub peer_id: String,
}

/// `chunk` payload nested inside a `receive` success body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkPayload {
    #[serde(rename = "chunkIndex")]
    pub chunk_index: i64,
    #[serde(rename = "totalChunks")]
    pub total_chunks: i64,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
#[serde(rename_all = "camelCase")]
pub enum ReceiveResponse {
    #[serde(rename = "chunkAvailable")]
    ChunkAvailable { chunk: ChunkPayload },
    Waiting,
    Done,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitingResponse {
    pub status: &'static str,
}

impl Default for WaitingResponse {
    fn default() -> Self {
        Self { status: "waiting" }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AckStatusResponse {
    pub acknowledged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterResponse {
    pub status: &'static str,
    #[serde(rename = "ttlSec")]
    pub ttl_sec: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupResponse {
    #[serde(rename = "peerId")]
    pub peer_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalQueuedResponse {
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalMessageOut {
    pub from: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResponse {
    pub messages: Vec<SignalMessageOut>,
}

// ---------------------------------------------------------------------------
// Envelope REST surface — /api/v1/sessions
// ---------------------------------------------------------------------------

/// Versioned wrapper around a ciphertext blob, exchanged via the handshake endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u8,
    #[serde(rename = "sessionId")]
    pub session_id: uuid::Uuid,
    #[serde(rename = "nonceB64")]
    pub nonce_b64: String,
    #[serde(rename = "ctB64")]
    pub ct_b64: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeRequest {
    pub envelope: Envelope,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeResponse {
    pub envelope: Envelope,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: uuid::Uuid,
    pub pin: String,
    #[serde(rename = "saltB64")]
    pub salt_b64: String,
    #[serde(rename = "ttlSec")]
    pub ttl_sec: u64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolvePinQuery {
    pub pin: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvePinResponse {
    #[serde(rename = "sessionId")]
    pub session_id: uuid::Uuid,
    #[serde(rename = "saltB64")]
    pub salt_b64: String,
    #[serde(rename = "ttlSec")]
    pub ttl_sec: u64,
}

// ---------------------------------------------------------------------------
// Ancillary: edition + health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    Community,
    Enterprise,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditionResponse {
    pub edition: Edition,
    #[serde(rename = "isEnterprise")]
    pub is_enterprise: bool,
    pub features: serde_json::Value,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub edition: Edition,
    pub uptime: u64,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_request_deserializes_camel_case_fields() {
        let json = serde_json::json!({
            "pin": "Ab3Xy9Zk",
            "passwordHash": "h1",
            "chunkIndex": 0,
            "totalChunks": 2,
            "data": "C0",
        });
        let req: SendRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.chunk_index, 0);
        assert_eq!(req.total_chunks, 2);
    }

    #[test]
    fn receive_response_chunk_available_serializes_with_tagged_status() {
        let resp = ReceiveResponse::ChunkAvailable {
            chunk: ChunkPayload {
                chunk_index: 0,
                total_chunks: 2,
                data: "C0".to_owned(),
            },
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["status"], "chunkAvailable");
        assert_eq!(value["chunk"]["chunkIndex"], 0);
    }

    #[test]
    fn http_error_envelope_omits_message_when_absent() {
        let env = HttpErrorEnvelope::new(error_codes::MISSING_FIELDS);
        let value = serde_json::to_value(&env).unwrap();
        assert!(value.get("message").is_none());
    }
}
