//! Envelope Session Engine (C4): server-minted session id + PIN-indexed
//! lookup, one offer and one answer envelope, offer-before-answer ordering,
//! one-shot answer delivery.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use relay_store::{PutOutcome, Record, Store, StoreExt};
use relay_protocol::Envelope;
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::lifecycle::{ENVELOPE_SESSION_TTL, FORCE_EXPIRE_TTL, PIN_INDEX_TTL};

const MAX_ATTEMPTS: u32 = 3;
const PIN_MINT_ATTEMPTS: u32 = 10;
const PIN_DIGITS: usize = 6;
const SALT_BYTES: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeSessionRecord {
    pub salt_b64: String,
    pub pin: String,
    pub offer: Option<Envelope>,
    pub answer: Option<Envelope>,
    pub answer_delivered: bool,
    /// Set once the one-shot answer has been delivered. A force-expired
    /// record is kept around briefly (`FORCE_EXPIRE_TTL`) so a read can
    /// report `session_expired` instead of indistinguishably `session_not_found`.
    pub force_expired: bool,
    pub created_at: DateTime<Utc>,
}

pub struct CreatedSession {
    pub session_id: Uuid,
    pub pin: String,
    pub salt_b64: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct ResolvedPin {
    pub session_id: Uuid,
    pub salt_b64: String,
    pub ttl_sec: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PinIndexRecord {
    session_id: Uuid,
}

enum Lookup {
    NotFound,
    Expired,
    Alive(Record<EnvelopeSessionRecord>),
}

async fn lookup_session(
    store: &Arc<dyn Store>,
    session_key: &str,
) -> Result<Lookup, ServiceError> {
    match store.get_typed::<EnvelopeSessionRecord>(session_key).await? {
        None => Ok(Lookup::NotFound),
        Some(record) if record.value.force_expired => Ok(Lookup::Expired),
        Some(record) => Ok(Lookup::Alive(record)),
    }
}

fn remaining_ttl(record: &Record<EnvelopeSessionRecord>, now: DateTime<Utc>) -> Duration {
    let secs = (record.expires_at - now).num_seconds().max(1);
    Duration::from_secs(secs as u64)
}

fn mint_pin() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:0width$}", width = PIN_DIGITS)
}

pub async fn create_session(store: &Arc<dyn Store>) -> Result<CreatedSession, ServiceError> {
    let session_id = Uuid::new_v4();
    let mut salt_bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill(&mut salt_bytes);
    let salt_b64 = {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(salt_bytes)
    };

    let mut pin = None;
    for _ in 0..PIN_MINT_ATTEMPTS {
        let candidate = mint_pin();
        let pin_key = relay_store::keys::pin_index_key(&candidate);
        if store.get(&pin_key).await?.is_none() {
            pin = Some(candidate);
            break;
        }
    }
    let pin = pin.ok_or_else(|| ServiceError::Internal("pin space exhausted".into()))?;

    let now = Utc::now();
    let record = EnvelopeSessionRecord {
        salt_b64: salt_b64.clone(),
        pin: pin.clone(),
        offer: None,
        answer: None,
        answer_delivered: false,
        force_expired: false,
        created_at: now,
    };

    let session_key = relay_store::keys::envelope_session_key(&session_id.to_string());
    store.put_typed(&session_key, &record, ENVELOPE_SESSION_TTL).await?;

    let pin_key = relay_store::keys::pin_index_key(&pin);
    store
        .put_typed(&pin_key, &PinIndexRecord { session_id }, PIN_INDEX_TTL)
        .await?;

    Ok(CreatedSession {
        session_id,
        pin,
        salt_b64,
        created_at: now,
        expires_at: now + chrono::Duration::from_std(ENVELOPE_SESSION_TTL).unwrap(),
    })
}

pub async fn resolve_pin(store: &Arc<dyn Store>, pin: &str) -> Result<ResolvedPin, ServiceError> {
    let pin_key = relay_store::keys::pin_index_key(pin);
    let Some(index) = store.take_typed::<PinIndexRecord>(&pin_key).await? else {
        return Err(ServiceError::PinNotFound);
    };

    let session_key = relay_store::keys::envelope_session_key(&index.value.session_id.to_string());
    let Some(record) = store.get_typed::<EnvelopeSessionRecord>(&session_key).await? else {
        return Err(ServiceError::PinExpired);
    };
    if record.value.force_expired {
        return Err(ServiceError::PinExpired);
    }

    let ttl_sec = (record.expires_at - Utc::now()).num_seconds().max(0) as u64;
    Ok(ResolvedPin {
        session_id: index.value.session_id,
        salt_b64: record.value.salt_b64,
        ttl_sec,
    })
}

pub async fn post_offer(
    store: &Arc<dyn Store>,
    session_id: Uuid,
    envelope: &Envelope,
) -> Result<(), ServiceError> {
    if !crate::validation::is_valid_envelope(envelope, session_id) {
        return Err(ServiceError::InvalidEnvelope);
    }
    let session_key = relay_store::keys::envelope_session_key(&session_id.to_string());

    for attempt in 0..MAX_ATTEMPTS {
        match lookup_session(store, &session_key).await? {
            Lookup::NotFound => return Err(ServiceError::SessionNotFound),
            Lookup::Expired => return Err(ServiceError::SessionExpired),
            Lookup::Alive(record) => {
                if record.value.offer.is_some() {
                    return Err(ServiceError::OfferAlreadySet);
                }
                let mut updated = record.value.clone();
                updated.offer = Some(envelope.clone());
                let ttl = remaining_ttl(&record, Utc::now());
                let outcome = store
                    .put_typed_if_version(&session_key, &updated, record.version, ttl)
                    .await?;
                if matches!(outcome, PutOutcome::Ok { .. }) {
                    return Ok(());
                }
                trace!(attempt, session_key, "post_offer: version conflict, retrying");
            }
        }
    }
    Err(ServiceError::ConcurrencyConflict)
}

pub async fn post_answer(
    store: &Arc<dyn Store>,
    session_id: Uuid,
    envelope: &Envelope,
) -> Result<(), ServiceError> {
    if !crate::validation::is_valid_envelope(envelope, session_id) {
        return Err(ServiceError::InvalidEnvelope);
    }
    let session_key = relay_store::keys::envelope_session_key(&session_id.to_string());

    for attempt in 0..MAX_ATTEMPTS {
        match lookup_session(store, &session_key).await? {
            Lookup::NotFound => return Err(ServiceError::SessionNotFound),
            Lookup::Expired => return Err(ServiceError::SessionExpired),
            Lookup::Alive(record) => {
                if record.value.offer.is_none() {
                    return Err(ServiceError::OfferNotSet);
                }
                if record.value.answer.is_some() {
                    return Err(ServiceError::AnswerAlreadySet);
                }
                let mut updated = record.value.clone();
                updated.answer = Some(envelope.clone());
                let ttl = remaining_ttl(&record, Utc::now());
                let outcome = store
                    .put_typed_if_version(&session_key, &updated, record.version, ttl)
                    .await?;
                if matches!(outcome, PutOutcome::Ok { .. }) {
                    return Ok(());
                }
                trace!(attempt, session_key, "post_answer: version conflict, retrying");
            }
        }
    }
    Err(ServiceError::ConcurrencyConflict)
}

pub async fn get_offer(store: &Arc<dyn Store>, session_id: Uuid) -> Result<Envelope, ServiceError> {
    let session_key = relay_store::keys::envelope_session_key(&session_id.to_string());
    match lookup_session(store, &session_key).await? {
        Lookup::NotFound => Err(ServiceError::SessionNotFound),
        Lookup::Expired => Err(ServiceError::SessionExpired),
        Lookup::Alive(record) => record.value.offer.clone().ok_or(ServiceError::OfferNotSet),
    }
}

/// First successful read flips `answerDelivered` and force-expires the
/// session; every read after that observes `session_expired`.
pub async fn get_answer(store: &Arc<dyn Store>, session_id: Uuid) -> Result<Envelope, ServiceError> {
    let session_key = relay_store::keys::envelope_session_key(&session_id.to_string());

    for attempt in 0..MAX_ATTEMPTS {
        match lookup_session(store, &session_key).await? {
            Lookup::NotFound => return Err(ServiceError::SessionNotFound),
            Lookup::Expired => return Err(ServiceError::SessionExpired),
            Lookup::Alive(record) => {
                let Some(answer) = record.value.answer.clone() else {
                    return Err(ServiceError::AnswerNotSet);
                };
                let mut updated = record.value.clone();
                updated.answer_delivered = true;
                updated.force_expired = true;
                let outcome = store
                    .put_typed_if_version(&session_key, &updated, record.version, FORCE_EXPIRE_TTL)
                    .await?;
                if matches!(outcome, PutOutcome::Ok { .. }) {
                    return Ok(answer);
                }
                trace!(attempt, session_key, "get_answer: lost the one-shot race, retrying");
            }
        }
    }
    Err(ServiceError::ConcurrencyConflict)
}

pub async fn delete_session(store: &Arc<dyn Store>, session_id: Uuid) -> Result<(), ServiceError> {
    let session_key = relay_store::keys::envelope_session_key(&session_id.to_string());
    if let Some(record) = store.get_typed::<EnvelopeSessionRecord>(&session_key).await? {
        let pin_key = relay_store::keys::pin_index_key(&record.value.pin);
        let _ = store.del(&pin_key).await;
    }
    store.del(&session_key).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_store::MemoryStore;

    fn sample_envelope(session_id: Uuid) -> Envelope {
        use base64::Engine;
        Envelope {
            v: 1,
            session_id,
            nonce_b64: base64::engine::general_purpose::STANDARD.encode([1u8; 12]),
            ct_b64: base64::engine::general_purpose::STANDARD.encode([2u8; 16]),
        }
    }

    #[tokio::test]
    async fn create_then_resolve_by_pin_consumes_the_index_once() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let created = create_session(&store).await.unwrap();

        let resolved = resolve_pin(&store, &created.pin).await.unwrap();
        assert_eq!(resolved.session_id, created.session_id);

        let err = resolve_pin(&store, &created.pin).await.unwrap_err();
        assert_eq!(err, ServiceError::PinNotFound);
    }

    #[tokio::test]
    async fn offer_then_answer_then_one_shot_answer_delivery() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let created = create_session(&store).await.unwrap();
        let id = created.session_id;

        let offer = sample_envelope(id);
        post_offer(&store, id, &offer).await.unwrap();
        assert_eq!(get_offer(&store, id).await.unwrap(), offer);
        assert_eq!(
            post_offer(&store, id, &offer).await.unwrap_err(),
            ServiceError::OfferAlreadySet
        );

        let answer = sample_envelope(id);
        post_answer(&store, id, &answer).await.unwrap();

        assert_eq!(get_answer(&store, id).await.unwrap(), answer);
        assert_eq!(get_answer(&store, id).await.unwrap_err(), ServiceError::SessionExpired);
    }

    #[tokio::test]
    async fn answer_before_offer_is_rejected() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let created = create_session(&store).await.unwrap();
        let answer = sample_envelope(created.session_id);
        let err = post_answer(&store, created.session_id, &answer).await.unwrap_err();
        assert_eq!(err, ServiceError::OfferNotSet);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_subsequent_get_is_not_found() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let created = create_session(&store).await.unwrap();

        delete_session(&store, created.session_id).await.unwrap();
        delete_session(&store, created.session_id).await.unwrap();

        let err = get_offer(&store, created.session_id).await.unwrap_err();
        assert_eq!(err, ServiceError::SessionNotFound);
    }

    #[tokio::test]
    async fn unknown_session_id_is_not_found_not_expired() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let err = get_offer(&store, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err, ServiceError::SessionNotFound);
    }
}
