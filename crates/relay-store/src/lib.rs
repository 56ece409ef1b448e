//! relay-store: the pluggable KV persistence layer (C1 + C2).
//!
//! Two backends satisfy the same [`Store`] trait: [`MemoryStore`] (process-
//! local, used when no external credential is configured) and, behind the
//! `redis-backend` feature, [`redis_store::RedisStore`] for production. The
//! engine (in `relay-core`) is the only code that interprets stored values;
//! this crate only moves opaque JSON records around with TTL and CAS
//! semantics.

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis_store;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "redis-backend")]
pub use redis_store::RedisStore;
pub use store::{PutOutcome, Record, Store, StoreExt};
