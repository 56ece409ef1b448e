//! KV Abstraction (C1): typed get/put/del/list with versioned CAS and TTL
//! against a pluggable backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub type Result<T> = std::result::Result<T, StoreError>;

/// A stored value together with its CAS token and expiry.
///
/// Every value persisted through the store is self-describing: it carries
/// its own `expires_at` so `get` can apply expiry-on-read regardless of
/// whether the backend has native TTL support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record<T> {
    pub value: T,
    pub version: u64,
    pub expires_at: DateTime<Utc>,
}

impl<T> Record<T> {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Ok { version: u64 },
    Conflict,
}

/// Pluggable persistence backend. Implementations never interpret `value` —
/// it is opaque JSON to the store; only the engine knows its shape.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Record<serde_json::Value>>>;

    /// Unconditional write. Returns the freshly assigned version.
    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<u64>;

    /// Write only if the stored version matches `expected` (or the key is
    /// absent and `expected == 0`). This is the logical CAS primitive the
    /// engine's retry loop is built on; the backend is not assumed to offer
    /// native compare-and-swap.
    async fn put_if_version(
        &self,
        key: &str,
        value: serde_json::Value,
        expected: u64,
        ttl: Duration,
    ) -> Result<PutOutcome>;

    async fn del(&self, key: &str) -> Result<()>;

    /// Atomic read-and-delete. On backends without native atomicity this is
    /// `get -> del -> return`; a failed delete after a successful read
    /// returns `Ok(None)` rather than risk double delivery.
    async fn take(&self, key: &str) -> Result<Option<Record<serde_json::Value>>>;

    /// Keys currently stored under `prefix`. Used only by the sweeper.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Convenience helpers for typed access, layered over the raw JSON `Store`.
#[async_trait]
pub trait StoreExt: Store {
    async fn get_typed<T: for<'de> Deserialize<'de> + Send>(
        &self,
        key: &str,
    ) -> Result<Option<Record<T>>> {
        match self.get(key).await? {
            Some(record) => Ok(Some(Record {
                value: serde_json::from_value(record.value)?,
                version: record.version,
                expires_at: record.expires_at,
            })),
            None => Ok(None),
        }
    }

    async fn put_typed<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<u64> {
        self.put(key, serde_json::to_value(value)?, ttl).await
    }

    async fn put_typed_if_version<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        expected: u64,
        ttl: Duration,
    ) -> Result<PutOutcome> {
        self.put_if_version(key, serde_json::to_value(value)?, expected, ttl)
            .await
    }

    async fn take_typed<T: for<'de> Deserialize<'de> + Send>(
        &self,
        key: &str,
    ) -> Result<Option<Record<T>>> {
        match self.take(key).await? {
            Some(record) => Ok(Some(Record {
                value: serde_json::from_value(record.value)?,
                version: record.version,
                expires_at: record.expires_at,
            })),
            None => Ok(None),
        }
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
