//! External `Store` backend over Redis, used in production when
//! `REDIS_URL` is configured.
//!
//! Writes are full-record overwrites (§4.1): the engine's logical CAS is
//! enforced here via a Lua script that checks the stored `version` field
//! before overwriting, since a single `SET` is not itself a compare-and-swap.
//! Native key expiry (`PX`) is applied in addition to the record's own
//! `expires_at` field, per the "defense in depth" note in the spec's design
//! notes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::StoreError;
use crate::store::{PutOutcome, Record, Result, Store};

pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(StoreError::Redis)?;
        let manager = client.get_connection_manager().await.map_err(StoreError::Redis)?;
        Ok(Self { manager })
    }

    fn encode(value: &serde_json::Value, version: u64, expires_at: chrono::DateTime<Utc>) -> Result<String> {
        let record = Record {
            value: value.clone(),
            version,
            expires_at,
        };
        Ok(serde_json::to_string(&record)?)
    }

    fn decode(raw: &str) -> Result<Record<serde_json::Value>> {
        Ok(serde_json::from_str(raw)?)
    }

    fn expiry(ttl: Duration) -> chrono::DateTime<Utc> {
        Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
    }
}

/// Atomically reads the stored version (or 0 when absent/expired), compares
/// against ARGV[2], and on match overwrites with ARGV[1] plus a PX expiry.
const PUT_IF_VERSION_SCRIPT: &str = r"
local raw = redis.call('GET', KEYS[1])
local current_version = 0
if raw then
    local ok, decoded = pcall(cjson.decode, raw)
    if ok and decoded.version then
        current_version = decoded.version
    end
end
if current_version ~= tonumber(ARGV[2]) then
    return -1
end
redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[3])
return tonumber(ARGV[4])
";

/// Atomically fetches and deletes a key in one round trip.
const TAKE_SCRIPT: &str = r"
local raw = redis.call('GET', KEYS[1])
if raw then
    redis.call('DEL', KEYS[1])
end
return raw
";

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Record<serde_json::Value>>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(key).await.map_err(StoreError::Redis)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let record = Self::decode(&raw)?;
        if record.is_expired(Utc::now()) {
            let _: Result<()> = self.del(key).await;
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<u64> {
        let mut conn = self.manager.clone();
        let current_version: Option<String> = conn.get(key).await.map_err(StoreError::Redis)?;
        let version = match current_version {
            Some(raw) => Self::decode(&raw).map(|r| r.version + 1).unwrap_or(1),
            None => 1,
        };
        let expires_at = Self::expiry(ttl);
        let encoded = Self::encode(&value, version, expires_at)?;
        let px = ttl.as_millis().max(1) as u64;
        let _: () = conn
            .set_ex(key, encoded, px.div_ceil(1000).max(1))
            .await
            .map_err(StoreError::Redis)?;
        Ok(version)
    }

    async fn put_if_version(
        &self,
        key: &str,
        value: serde_json::Value,
        expected: u64,
        ttl: Duration,
    ) -> Result<PutOutcome> {
        let expires_at = Self::expiry(ttl);
        let new_version = expected + 1;
        let encoded = Self::encode(&value, new_version, expires_at)?;
        let px = ttl.as_millis().max(1) as u64;

        let mut conn = self.manager.clone();
        let result: i64 = redis::Script::new(PUT_IF_VERSION_SCRIPT)
            .key(key)
            .arg(encoded)
            .arg(expected)
            .arg(px)
            .arg(new_version)
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::Redis)?;

        if result < 0 {
            Ok(PutOutcome::Conflict)
        } else {
            Ok(PutOutcome::Ok {
                version: result as u64,
            })
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await.map_err(StoreError::Redis)?;
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<Record<serde_json::Value>>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::Script::new(TAKE_SCRIPT)
            .key(key)
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::Redis)?;
        match raw {
            Some(raw) => {
                let record = Self::decode(&raw)?;
                if record.is_expired(Utc::now()) {
                    Ok(None)
                } else {
                    Ok(Some(record))
                }
            }
            None => Ok(None),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        let pattern = format!("{prefix}*");
        let mut cursor = 0u64;
        let mut keys = Vec::new();
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
                .map_err(StoreError::Redis)?;
            keys.extend(batch);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(keys)
    }
}
