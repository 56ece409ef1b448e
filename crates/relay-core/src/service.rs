//! Public Service API (C7): one async method per `/api/relay` action and per
//! envelope-session REST endpoint, each a pure function over C1–C6 returning
//! a [`ServiceError`] — never an HTTP status. `relay-server` owns that mapping.

use std::sync::Arc;

use relay_protocol::{
    AckStatusResponse, ChunkPayload, CreateSessionResponse, Envelope, EnvelopeResponse,
    LookupResponse, OkResponse, PollResponse, ReceiveResponse, RegisterResponse,
    ResolvePinResponse, SignalMessageOut, SignalQueuedResponse, WaitingResponse,
};
use relay_store::Store;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::lifecycle::ENVELOPE_SESSION_TTL;
use crate::relay::NextOutcome;
use crate::{discovery, envelope, relay, validation};

pub struct RelayService {
    store: Arc<dyn Store>,
}

impl RelayService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Exposed so `relay-server` can hand the same store to the sweeper.
    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    pub async fn send(
        &self,
        pin: &str,
        password_hash: &str,
        chunk_index: i64,
        total_chunks: i64,
        data: &str,
    ) -> Result<WaitingResponse, ServiceError> {
        if pin.is_empty() || password_hash.is_empty() {
            return Err(ServiceError::MissingFields);
        }
        if !validation::is_valid_invite_code(pin) || !validation::is_valid_password_hash(password_hash) {
            return Err(ServiceError::InvalidChunk);
        }
        let session_key = relay_store::keys::relay_session_key(pin, password_hash);
        relay::push(&self.store, &session_key, chunk_index, total_chunks, data).await?;
        Ok(WaitingResponse::default())
    }

    pub async fn receive(
        &self,
        pin: &str,
        password_hash: &str,
    ) -> Result<ReceiveResponse, ServiceError> {
        if pin.is_empty() || password_hash.is_empty() {
            return Err(ServiceError::MissingPinOrPasswordHash);
        }
        let session_key = relay_store::keys::relay_session_key(pin, password_hash);
        let ack_key = relay_store::keys::ack_key(pin, password_hash);
        let outcome = relay::next(&self.store, &session_key, &ack_key).await?;
        Ok(match outcome {
            NextOutcome::ChunkAvailable { chunk_index, total_chunks, data } => {
                ReceiveResponse::ChunkAvailable {
                    chunk: ChunkPayload { chunk_index, total_chunks, data },
                }
            }
            NextOutcome::Waiting => ReceiveResponse::Waiting,
            NextOutcome::Done => ReceiveResponse::Done,
            NextOutcome::Expired => ReceiveResponse::Expired,
        })
    }

    pub async fn ack(&self, pin: &str, password_hash: &str) -> Result<OkResponse, ServiceError> {
        if pin.is_empty() || password_hash.is_empty() {
            return Err(ServiceError::MissingFields);
        }
        let session_key = relay_store::keys::relay_session_key(pin, password_hash);
        let ack_key = relay_store::keys::ack_key(pin, password_hash);
        relay::set_ack(&self.store, &session_key, &ack_key).await?;
        Ok(OkResponse { ok: true })
    }

    pub async fn ack_status(
        &self,
        pin: &str,
        password_hash: &str,
    ) -> Result<AckStatusResponse, ServiceError> {
        if pin.is_empty() || password_hash.is_empty() {
            return Err(ServiceError::MissingFields);
        }
        let session_key = relay_store::keys::relay_session_key(pin, password_hash);
        let ack_key = relay_store::keys::ack_key(pin, password_hash);
        let acknowledged = relay::get_ack(&self.store, &session_key, &ack_key).await?;
        Ok(AckStatusResponse { acknowledged })
    }

    pub async fn register(
        &self,
        invite_code: &str,
        peer_id: &str,
    ) -> Result<RegisterResponse, ServiceError> {
        if invite_code.is_empty() || peer_id.is_empty() {
            return Err(ServiceError::MissingFields);
        }
        if !validation::is_valid_invite_code(invite_code) {
            return Err(ServiceError::InvalidInviteCode);
        }
        let peer_key = relay_store::keys::peer_key(invite_code);
        let ttl = discovery::register(&self.store, &peer_key, peer_id).await?;
        Ok(RegisterResponse { status: "registered", ttl_sec: ttl.as_secs() })
    }

    pub async fn lookup(&self, invite_code: &str) -> Result<LookupResponse, ServiceError> {
        if invite_code.is_empty() {
            return Err(ServiceError::MissingInviteCode);
        }
        let peer_key = relay_store::keys::peer_key(invite_code);
        let peer_id = discovery::lookup(&self.store, &peer_key).await?;
        Ok(LookupResponse { peer_id })
    }

    pub async fn signal(
        &self,
        from: &str,
        to: &str,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<SignalQueuedResponse, ServiceError> {
        if from.is_empty() || to.is_empty() || kind.is_empty() {
            return Err(ServiceError::MissingFields);
        }
        if !validation::is_valid_signal_type(kind) {
            return Err(ServiceError::InvalidSignalType);
        }
        let mailbox_key = relay_store::keys::signal_mailbox_key(to);
        discovery::signal(&self.store, &mailbox_key, from, kind, payload).await?;
        Ok(SignalQueuedResponse { status: "queued" })
    }

    pub async fn poll(&self, peer_id: &str) -> Result<PollResponse, ServiceError> {
        if peer_id.is_empty() {
            return Err(ServiceError::MissingPeerId);
        }
        let mailbox_key = relay_store::keys::signal_mailbox_key(peer_id);
        let messages = discovery::poll(&self.store, &mailbox_key).await?;
        Ok(PollResponse {
            messages: messages
                .into_iter()
                .map(|m| SignalMessageOut {
                    from: m.from,
                    kind: m.kind,
                    payload: m.payload,
                    timestamp: m.timestamp.to_rfc3339(),
                })
                .collect(),
        })
    }

    pub async fn create_session(&self) -> Result<CreateSessionResponse, ServiceError> {
        let created = envelope::create_session(&self.store).await?;
        Ok(CreateSessionResponse {
            session_id: created.session_id,
            pin: created.pin,
            salt_b64: created.salt_b64,
            ttl_sec: ENVELOPE_SESSION_TTL.as_secs(),
            created_at: created.created_at.to_rfc3339(),
            expires_at: created.expires_at.to_rfc3339(),
        })
    }

    pub async fn resolve_pin(&self, pin: &str) -> Result<ResolvePinResponse, ServiceError> {
        let resolved = envelope::resolve_pin(&self.store, pin).await?;
        Ok(ResolvePinResponse {
            session_id: resolved.session_id,
            salt_b64: resolved.salt_b64,
            ttl_sec: resolved.ttl_sec,
        })
    }

    pub async fn post_offer(&self, session_id: Uuid, offer: Envelope) -> Result<(), ServiceError> {
        envelope::post_offer(&self.store, session_id, &offer).await
    }

    pub async fn get_offer(&self, session_id: Uuid) -> Result<EnvelopeResponse, ServiceError> {
        let envelope = envelope::get_offer(&self.store, session_id).await?;
        Ok(EnvelopeResponse { envelope })
    }

    pub async fn post_answer(&self, session_id: Uuid, answer: Envelope) -> Result<(), ServiceError> {
        envelope::post_answer(&self.store, session_id, &answer).await
    }

    pub async fn get_answer(&self, session_id: Uuid) -> Result<EnvelopeResponse, ServiceError> {
        let envelope = envelope::get_answer(&self.store, session_id).await?;
        Ok(EnvelopeResponse { envelope })
    }

    pub async fn delete_session(&self, session_id: Uuid) -> Result<(), ServiceError> {
        envelope::delete_session(&self.store, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_store::MemoryStore;

    fn service() -> RelayService {
        RelayService::new(Arc::new(MemoryStore::new()))
    }

    /// S1 — two-chunk transfer.
    #[tokio::test]
    async fn two_chunk_transfer_scenario() {
        let svc = service();
        svc.send("Ab3Xy9Zk", "h1", 0, 2, "C0").await.unwrap();
        svc.send("Ab3Xy9Zk", "h1", 1, 2, "C1").await.unwrap();

        assert_eq!(
            svc.receive("Ab3Xy9Zk", "h1").await.unwrap(),
            ReceiveResponse::ChunkAvailable {
                chunk: ChunkPayload { chunk_index: 0, total_chunks: 2, data: "C0".into() }
            }
        );
        assert_eq!(
            svc.receive("Ab3Xy9Zk", "h1").await.unwrap(),
            ReceiveResponse::ChunkAvailable {
                chunk: ChunkPayload { chunk_index: 1, total_chunks: 2, data: "C1".into() }
            }
        );
        assert_eq!(svc.receive("Ab3Xy9Zk", "h1").await.unwrap(), ReceiveResponse::Done);
    }

    /// S2 — duplicate index.
    #[tokio::test]
    async fn duplicate_index_scenario() {
        let svc = service();
        svc.send("Ab3Xy9Zk", "h1", 0, 2, "A").await.unwrap();
        let err = svc.send("Ab3Xy9Zk", "h1", 0, 2, "B").await.unwrap_err();
        assert_eq!(err, ServiceError::DuplicateChunk);
    }

    /// S3 — totalChunks mismatch.
    #[tokio::test]
    async fn total_chunks_mismatch_scenario() {
        let svc = service();
        svc.send("Ab3Xy9Zk", "h1", 0, 2, "A").await.unwrap();
        let err = svc.send("Ab3Xy9Zk", "h1", 1, 3, "B").await.unwrap_err();
        assert_eq!(err, ServiceError::TotalChunksMismatch);
    }

    /// S4 — ack survives session teardown.
    #[tokio::test]
    async fn ack_after_teardown_scenario() {
        let svc = service();
        svc.send("Ab3Xy9Zk", "h1", 0, 1, "A").await.unwrap();
        svc.receive("Ab3Xy9Zk", "h1").await.unwrap();
        svc.receive("Ab3Xy9Zk", "h1").await.unwrap();

        svc.ack("Ab3Xy9Zk", "h1").await.unwrap();
        assert!(svc.ack_status("Ab3Xy9Zk", "h1").await.unwrap().acknowledged);

        svc.receive("Ab3Xy9Zk", "h1").await.unwrap();
        assert!(svc.ack_status("Ab3Xy9Zk", "h1").await.unwrap().acknowledged);
    }

    /// S5 — invite-code collision.
    #[tokio::test]
    async fn invite_code_collision_scenario() {
        let svc = service();
        let resp = svc.register("Uv9Wx1Yz", "p1").await.unwrap();
        assert_eq!(resp.ttl_sec, 30);

        let err = svc.register("Uv9Wx1Yz", "p2").await.unwrap_err();
        assert_eq!(err, ServiceError::InviteCodeInUse);

        svc.register("Uv9Wx1Yz", "p1").await.unwrap();
        assert_eq!(svc.lookup("Uv9Wx1Yz").await.unwrap().peer_id, "p1");
    }

    /// S6 — envelope one-shot handshake.
    #[tokio::test]
    async fn envelope_one_shot_scenario() {
        use base64::Engine;

        let svc = service();
        let created = svc.create_session().await.unwrap();

        let envelope = Envelope {
            v: 1,
            session_id: created.session_id,
            nonce_b64: base64::engine::general_purpose::STANDARD.encode([0u8; 12]),
            ct_b64: base64::engine::general_purpose::STANDARD.encode([1u8; 32]),
        };
        svc.post_offer(created.session_id, envelope.clone()).await.unwrap();
        svc.post_answer(created.session_id, envelope.clone()).await.unwrap();

        let first = svc.get_answer(created.session_id).await.unwrap();
        assert_eq!(first.envelope, envelope);

        let err = svc.get_answer(created.session_id).await.unwrap_err();
        assert_eq!(err, ServiceError::SessionExpired);
    }

    #[tokio::test]
    async fn send_with_malformed_invite_code_is_invalid_chunk() {
        let svc = service();
        let err = svc.send("short", "h1", 0, 1, "x").await.unwrap_err();
        assert_eq!(err, ServiceError::InvalidChunk);
    }

    #[tokio::test]
    async fn signal_rejects_unknown_type() {
        let svc = service();
        let err = svc
            .signal("p1", "p2", "hangup", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::InvalidSignalType);
    }
}
