//! Peer Discovery + Signal Mailbox (C5): invite-code → peer registry
//! (first-writer wins within TTL) and per-peer signal queue with atomic drain.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use relay_store::{PutOutcome, Store, StoreExt};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ServiceError;
use crate::lifecycle::{PEER_REGISTRATION_TTL, SIGNAL_TTL};

const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PeerRegistrationRecord {
    peer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalMessageRecord {
    pub from: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub async fn register(
    store: &Arc<dyn Store>,
    peer_key: &str,
    peer_id: &str,
) -> Result<Duration, ServiceError> {
    for attempt in 0..MAX_ATTEMPTS {
        let existing = store.get_typed::<PeerRegistrationRecord>(peer_key).await?;
        let expected_version = existing.as_ref().map(|r| r.version).unwrap_or(0);

        if let Some(record) = &existing {
            if record.value.peer_id != peer_id {
                return Err(ServiceError::InviteCodeInUse);
            }
        }

        let outcome = store
            .put_typed_if_version(
                peer_key,
                &PeerRegistrationRecord { peer_id: peer_id.to_owned() },
                expected_version,
                PEER_REGISTRATION_TTL,
            )
            .await?;

        if matches!(outcome, PutOutcome::Ok { .. }) {
            return Ok(PEER_REGISTRATION_TTL);
        }
        trace!(attempt, peer_key, "register: version conflict, retrying");
    }
    Err(ServiceError::ConcurrencyConflict)
}

pub async fn lookup(store: &Arc<dyn Store>, peer_key: &str) -> Result<String, ServiceError> {
    store
        .get_typed::<PeerRegistrationRecord>(peer_key)
        .await?
        .map(|record| record.value.peer_id)
        .ok_or(ServiceError::PeerNotFound)
}

pub async fn signal(
    store: &Arc<dyn Store>,
    mailbox_key: &str,
    from: &str,
    kind: &str,
    payload: serde_json::Value,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let message = SignalMessageRecord {
        from: from.to_owned(),
        kind: kind.to_owned(),
        payload,
        timestamp: now,
        expires_at: now + chrono::Duration::from_std(SIGNAL_TTL).unwrap(),
    };

    for attempt in 0..MAX_ATTEMPTS {
        let existing = store
            .get_typed::<Vec<SignalMessageRecord>>(mailbox_key)
            .await?;
        let expected_version = existing.as_ref().map(|r| r.version).unwrap_or(0);
        let mut messages = existing.map(|r| r.value).unwrap_or_default();
        messages.push(message.clone());

        let outcome = store
            .put_typed_if_version(mailbox_key, &messages, expected_version, SIGNAL_TTL)
            .await?;
        if matches!(outcome, PutOutcome::Ok { .. }) {
            return Ok(());
        }
        trace!(attempt, mailbox_key, "signal: version conflict, retrying");
    }
    Err(ServiceError::ConcurrencyConflict)
}

/// Atomic drain: read, delete, return FIFO contents filtered for expiry. A
/// failed delete after a successful read returns an empty list rather than
/// risk duplicate delivery.
pub async fn poll(
    store: &Arc<dyn Store>,
    mailbox_key: &str,
) -> Result<Vec<SignalMessageRecord>, ServiceError> {
    let now = Utc::now();
    match store.take_typed::<Vec<SignalMessageRecord>>(mailbox_key).await? {
        Some(record) => Ok(record
            .value
            .into_iter()
            .filter(|message| message.expires_at > now)
            .collect()),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_store::MemoryStore;

    #[tokio::test]
    async fn second_registration_under_a_different_peer_is_rejected_then_refresh_succeeds() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let key = relay_store::keys::peer_key("Uv9Wx1Yz");

        register(&store, &key, "p1").await.unwrap();
        let err = register(&store, &key, "p2").await.unwrap_err();
        assert_eq!(err, ServiceError::InviteCodeInUse);

        register(&store, &key, "p1").await.unwrap();
        assert_eq!(lookup(&store, &key).await.unwrap(), "p1");
    }

    #[tokio::test]
    async fn lookup_on_unregistered_invite_code_is_peer_not_found() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let key = relay_store::keys::peer_key("Uv9Wx1Yz");
        assert_eq!(lookup(&store, &key).await.unwrap_err(), ServiceError::PeerNotFound);
    }

    #[tokio::test]
    async fn poll_drains_mailbox_in_fifo_order_and_empties_it() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let key = relay_store::keys::signal_mailbox_key("peer-1");

        signal(&store, &key, "peer-2", "offer", serde_json::json!({"sdp": "a"}))
            .await
            .unwrap();
        signal(&store, &key, "peer-2", "ice-candidate", serde_json::json!({"c": "b"}))
            .await
            .unwrap();

        let drained = poll(&store, &key).await.unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind, "offer");
        assert_eq!(drained[1].kind, "ice-candidate");

        assert!(poll(&store, &key).await.unwrap().is_empty());
    }
}
