//! Process-local `Store` backed by a `DashMap`. Used in development and
//! whenever no external persistence credential is configured.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::store::{PutOutcome, Record, Result, Store};

#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, Record<serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn expiry(ttl: Duration) -> chrono::DateTime<Utc> {
        Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Record<serde_json::Value>>> {
        let now = Utc::now();
        let Some(entry) = self.records.get(key) else {
            return Ok(None);
        };
        if entry.is_expired(now) {
            drop(entry);
            self.records.remove(key);
            return Ok(None);
        }
        Ok(Some(entry.clone()))
    }

    async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<u64> {
        let expires_at = Self::expiry(ttl);
        let now = Utc::now();
        let mut new_version = 1;
        self.records
            .entry(key.to_owned())
            .and_modify(|existing| {
                new_version = if existing.is_expired(now) {
                    1
                } else {
                    existing.version + 1
                };
                existing.value = value.clone();
                existing.version = new_version;
                existing.expires_at = expires_at;
            })
            .or_insert_with(|| Record {
                value,
                version: 1,
                expires_at,
            });
        Ok(new_version)
    }

    async fn put_if_version(
        &self,
        key: &str,
        value: serde_json::Value,
        expected: u64,
        ttl: Duration,
    ) -> Result<PutOutcome> {
        let expires_at = Self::expiry(ttl);
        let now = Utc::now();

        let current_version = self.records.get(key).and_then(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.version)
            }
        });

        let matches = match current_version {
            None => expected == 0,
            Some(v) => v == expected,
        };
        if !matches {
            return Ok(PutOutcome::Conflict);
        }

        let new_version = expected + 1;
        self.records.insert(
            key.to_owned(),
            Record {
                value,
                version: new_version,
                expires_at,
            },
        );
        Ok(PutOutcome::Ok {
            version: new_version,
        })
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.records.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<Record<serde_json::Value>>> {
        let now = Utc::now();
        match self.records.remove(key) {
            Some((_, record)) if !record.is_expired(now) => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .records
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| key.starts_with(prefix))
            .collect())
    }
}
