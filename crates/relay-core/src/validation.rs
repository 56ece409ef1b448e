//! Shared validation helpers for the relay, envelope and discovery engines.

use base64::Engine;
use uuid::Uuid;

pub const MAX_CHUNK_BYTES: usize = 48 * 1024;
pub const MAX_TOTAL_CHUNKS: i64 = 2048;
pub const MIN_PASSWORD_HASH_LEN: usize = 16;
pub const MAX_PASSWORD_HASH_LEN: usize = 256;
pub const INVITE_CODE_LEN: usize = 8;
pub const MAX_PEER_ID_LEN: usize = 128;
pub const ENVELOPE_NONCE_LEN: usize = 12;
pub const MIN_ENVELOPE_CIPHERTEXT_LEN: usize = 16;
pub const MAX_ENVELOPE_CIPHERTEXT_LEN: usize = 64 * 1024;

pub const SIGNAL_TYPES: &[&str] = &["offer", "answer", "ice-candidate"];

pub fn is_valid_invite_code(code: &str) -> bool {
    code.chars().count() == INVITE_CODE_LEN && code.chars().all(|c| c.is_ascii_alphanumeric())
}

pub fn is_valid_password_hash(hash: &str) -> bool {
    let len = hash.chars().count();
    if !(MIN_PASSWORD_HASH_LEN..=MAX_PASSWORD_HASH_LEN).contains(&len) {
        return false;
    }
    hash.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_'))
}

pub fn is_valid_chunk_bounds(chunk_index: i64, total_chunks: i64) -> bool {
    (1..=MAX_TOTAL_CHUNKS).contains(&total_chunks) && (0..total_chunks).contains(&chunk_index)
}

pub fn is_valid_chunk_size(data: &str) -> bool {
    data.len() <= MAX_CHUNK_BYTES
}

pub fn is_valid_signal_type(kind: &str) -> bool {
    SIGNAL_TYPES.contains(&kind)
}

fn decode_strict_base64(value: &str) -> Option<Vec<u8>> {
    base64::engine::general_purpose::STANDARD.decode(value).ok()
}

/// Validates `{v, sessionId, nonceB64, ctB64}` against the path's session id:
/// `v == 1`, the ids match, the nonce decodes to exactly 12 bytes, and the
/// ciphertext decodes to 16 B .. 64 KiB of strict (padded) base64.
pub fn is_valid_envelope(envelope: &relay_protocol::Envelope, expected_session_id: Uuid) -> bool {
    if envelope.v != 1 || envelope.session_id != expected_session_id {
        return false;
    }
    let Some(nonce) = decode_strict_base64(&envelope.nonce_b64) else {
        return false;
    };
    if nonce.len() != ENVELOPE_NONCE_LEN {
        return false;
    }
    let Some(ct) = decode_strict_base64(&envelope.ct_b64) else {
        return false;
    };
    (MIN_ENVELOPE_CIPHERTEXT_LEN..=MAX_ENVELOPE_CIPHERTEXT_LEN).contains(&ct.len())
}
