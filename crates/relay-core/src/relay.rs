//! Relay Session Engine (C3): chunk mailbox with optimistic CAS loop,
//! per-index uniqueness, in-order delivery, completion + ack lifecycle.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use relay_store::{PutOutcome, Store, StoreExt};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::ServiceError;
use crate::lifecycle::{chunk_session_ttl, ACK_TTL};
use crate::validation::{is_valid_chunk_bounds, is_valid_chunk_size};

const MAX_CAS_ATTEMPTS: u32 = 5;
const BACKOFF_BASE_MS: u64 = 50;
const BACKOFF_CAP_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySessionRecord {
    pub total_chunks: i64,
    pub chunks: BTreeMap<i64, String>,
    pub delivered: BTreeSet<i64>,
    pub completed: bool,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
    pub last_touched: DateTime<Utc>,
}

impl RelaySessionRecord {
    fn fresh(total_chunks: i64) -> Self {
        let now = Utc::now();
        Self {
            total_chunks,
            chunks: BTreeMap::new(),
            delivered: BTreeSet::new(),
            completed: false,
            acknowledged: false,
            created_at: now,
            last_touched: now,
        }
    }

    fn touch(&mut self) {
        self.last_touched = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AckRecord {
    pub acknowledged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextOutcome {
    ChunkAvailable {
        chunk_index: i64,
        total_chunks: i64,
        data: String,
    },
    Waiting,
    Done,
    Expired,
}

async fn backoff(attempt: u32) {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(4));
    let capped = exp.min(BACKOFF_CAP_MS);
    let jitter = rand::thread_rng().gen_range(0..=capped / 4 + 1);
    tokio::time::sleep(Duration::from_millis(capped + jitter)).await;
}

/// push: validates, then runs the optimistic CAS retry loop described in the
/// relay session engine design. Duplicate-chunk and totalChunks-mismatch are
/// deterministic state conflicts and are never retried; only version-conflict
/// races against the backend are retried, bounded, with exponential backoff.
pub async fn push(
    store: &Arc<dyn Store>,
    session_key: &str,
    chunk_index: i64,
    total_chunks: i64,
    data: &str,
) -> Result<(), ServiceError> {
    if !is_valid_chunk_bounds(chunk_index, total_chunks) || !is_valid_chunk_size(data) {
        return Err(ServiceError::InvalidChunk);
    }

    let ttl = chunk_session_ttl(total_chunks);

    for attempt in 0..MAX_CAS_ATTEMPTS {
        let existing = store.get_typed::<RelaySessionRecord>(session_key).await?;

        let (mut session, expected_version) = match existing {
            Some(record) => (record.value, record.version),
            None => (RelaySessionRecord::fresh(total_chunks), 0),
        };

        if expected_version != 0 && session.total_chunks != total_chunks {
            return Err(ServiceError::TotalChunksMismatch);
        }
        if session.delivered.contains(&chunk_index) || session.chunks.contains_key(&chunk_index) {
            return Err(ServiceError::DuplicateChunk);
        }

        session.chunks.insert(chunk_index, data.to_owned());
        session.touch();

        let outcome = store
            .put_typed_if_version(session_key, &session, expected_version, ttl)
            .await?;

        let PutOutcome::Ok { version: written_version } = outcome else {
            trace!(attempt, session_key, "push: version conflict, retrying");
            backoff(attempt).await;
            continue;
        };

        // Read-back verification closes the race against concurrent
        // last-writer-wins puts on backends without native CAS.
        let verify = store.get_typed::<RelaySessionRecord>(session_key).await?;
        if let Some(verify) = verify {
            let sees_our_write = verify.value.chunks.get(&chunk_index).map(String::as_str) == Some(data);
            if sees_our_write && verify.version >= written_version {
                return Ok(());
            }
        }
        trace!(attempt, session_key, "push: read-back verification failed, retrying");
        backoff(attempt).await;
    }

    warn!(session_key, "push: concurrency retry budget exhausted");
    Err(ServiceError::ConcurrencyConflict)
}

/// next: receiver poll. Delivers the smallest pending chunk index, reports
/// completion once every index has been delivered, and tears the session
/// down (together with the separate ack record) once both completed and
/// acknowledged.
pub async fn next(
    store: &Arc<dyn Store>,
    session_key: &str,
    ack_key: &str,
) -> Result<NextOutcome, ServiceError> {
    for attempt in 0..MAX_CAS_ATTEMPTS {
        let Some(record) = store.get_typed::<RelaySessionRecord>(session_key).await? else {
            return Ok(NextOutcome::Expired);
        };
        let mut session = record.value;
        let version = record.version;

        if let Some((&chunk_index, data)) = session.chunks.iter().next() {
            let data = data.clone();
            session.chunks.remove(&chunk_index);
            session.delivered.insert(chunk_index);
            session.touch();

            let ttl = chunk_session_ttl(session.total_chunks);
            let outcome = store
                .put_typed_if_version(session_key, &session, version, ttl)
                .await?;
            if let PutOutcome::Ok { .. } = outcome {
                return Ok(NextOutcome::ChunkAvailable {
                    chunk_index,
                    total_chunks: session.total_chunks,
                    data,
                });
            }
            backoff(attempt).await;
            continue;
        }

        if session.delivered.len() as i64 >= session.total_chunks {
            if !session.completed {
                session.completed = true;
                session.touch();
                let ttl = chunk_session_ttl(session.total_chunks);
                let outcome = store
                    .put_typed_if_version(session_key, &session, version, ttl)
                    .await?;
                if matches!(outcome, PutOutcome::Ok { .. }) {
                    return Ok(NextOutcome::Done);
                }
                backoff(attempt).await;
                continue;
            }

            // The ack record lives under its own key precisely so acknowledgment
            // survives this teardown; only the session record is torn down here.
            let ack = store.get_typed::<AckRecord>(ack_key).await?;
            if ack.map(|a| a.value.acknowledged).unwrap_or(false) {
                let _ = store.del(session_key).await;
            }
            return Ok(NextOutcome::Done);
        }

        return Ok(NextOutcome::Waiting);
    }

    Err(ServiceError::ConcurrencyConflict)
}

pub async fn set_ack(
    store: &Arc<dyn Store>,
    session_key: &str,
    ack_key: &str,
) -> Result<(), ServiceError> {
    store
        .put_typed(ack_key, &AckRecord { acknowledged: true }, ACK_TTL)
        .await?;

    if let Some(record) = store.get_typed::<RelaySessionRecord>(session_key).await? {
        let mut session = record.value;
        if !session.acknowledged {
            session.acknowledged = true;
            session.touch();
            let ttl = chunk_session_ttl(session.total_chunks);
            let _ = store
                .put_typed_if_version(session_key, &session, record.version, ttl)
                .await?;
        }
    }
    Ok(())
}

pub async fn get_ack(
    store: &Arc<dyn Store>,
    session_key: &str,
    ack_key: &str,
) -> Result<bool, ServiceError> {
    if let Some(record) = store.get_typed::<AckRecord>(ack_key).await? {
        return Ok(record.value.acknowledged);
    }
    if let Some(record) = store.get_typed::<RelaySessionRecord>(session_key).await? {
        return Ok(record.value.acknowledged);
    }
    Ok(false)
}
