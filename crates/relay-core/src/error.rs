use relay_protocol::error_codes;
use thiserror::Error;

/// Error taxonomy returned by the engine. `relay-server` maps each variant to
/// an HTTP status and the frozen error code from `relay_protocol::error_codes`
/// — the engine itself never knows about HTTP.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("missing required fields")]
    MissingFields,
    #[error("invalid chunk")]
    InvalidChunk,
    #[error("invalid envelope")]
    InvalidEnvelope,
    #[error("invalid invite code")]
    InvalidInviteCode,
    #[error("missing pin or passwordHash")]
    MissingPinOrPasswordHash,
    #[error("missing invite code")]
    MissingInviteCode,
    #[error("missing peer id")]
    MissingPeerId,

    #[error("offer already set")]
    OfferAlreadySet,
    #[error("answer already set")]
    AnswerAlreadySet,
    #[error("offer not set")]
    OfferNotSet,
    #[error("answer not set")]
    AnswerNotSet,
    #[error("invite code in use")]
    InviteCodeInUse,
    #[error("totalChunks mismatch")]
    TotalChunksMismatch,
    #[error("duplicate chunk")]
    DuplicateChunk,
    #[error("invalid signal type")]
    InvalidSignalType,

    #[error("pin not found")]
    PinNotFound,
    #[error("peer not found")]
    PeerNotFound,
    #[error("session not found")]
    SessionNotFound,
    #[error("pin expired")]
    PinExpired,
    #[error("session expired")]
    SessionExpired,

    #[error("payload too large")]
    PayloadTooLarge,
    #[error("concurrency conflict")]
    ConcurrencyConflict,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable wire error code, shared with `relay_protocol::error_codes`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFields => error_codes::MISSING_FIELDS,
            Self::InvalidChunk => error_codes::INVALID_CHUNK,
            Self::InvalidEnvelope => error_codes::INVALID_ENVELOPE,
            Self::InvalidInviteCode => error_codes::INVALID_INVITE_CODE,
            Self::MissingPinOrPasswordHash => error_codes::MISSING_PIN_OR_PASSWORD_HASH,
            Self::MissingInviteCode => error_codes::MISSING_INVITE_CODE,
            Self::MissingPeerId => error_codes::MISSING_PEER_ID,
            Self::OfferAlreadySet => error_codes::OFFER_ALREADY_SET,
            Self::AnswerAlreadySet => error_codes::ANSWER_ALREADY_SET,
            Self::OfferNotSet => error_codes::OFFER_NOT_SET,
            Self::AnswerNotSet => error_codes::ANSWER_NOT_SET,
            Self::InviteCodeInUse => error_codes::INVITE_CODE_IN_USE,
            Self::TotalChunksMismatch => error_codes::TOTAL_CHUNKS_MISMATCH,
            Self::DuplicateChunk => error_codes::DUPLICATE_CHUNK,
            Self::InvalidSignalType => error_codes::INVALID_SIGNAL_TYPE,
            Self::PinNotFound => error_codes::PIN_NOT_FOUND,
            Self::PeerNotFound => error_codes::PEER_NOT_FOUND,
            Self::SessionNotFound => error_codes::SESSION_NOT_FOUND,
            Self::PinExpired => error_codes::PIN_EXPIRED,
            Self::SessionExpired => error_codes::SESSION_EXPIRED,
            Self::PayloadTooLarge => error_codes::PAYLOAD_TOO_LARGE,
            Self::ConcurrencyConflict => error_codes::CONCURRENCY_CONFLICT,
            Self::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }
}

impl From<relay_store::StoreError> for ServiceError {
    fn from(err: relay_store::StoreError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}
