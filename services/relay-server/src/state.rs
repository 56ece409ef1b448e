use std::sync::Arc;
use std::time::Instant;

use relay_core::RelayService;
use relay_store::{MemoryStore, Store};
#[cfg(feature = "redis-backend")]
use relay_store::RedisStore;

use crate::config::Config;
use crate::ratelimit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RelayService>,
    pub config: Arc<Config>,
    pub started_at: Instant,
    pub resolve_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub async fn new(config: Config) -> Self {
        let store: Arc<dyn Store> = build_store(&config).await;
        Self {
            service: Arc::new(RelayService::new(store)),
            config: Arc::new(config),
            started_at: Instant::now(),
            resolve_limiter: Arc::new(RateLimiter::new(5, std::time::Duration::from_secs(1))),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(feature = "redis-backend")]
async fn build_store(config: &Config) -> Arc<dyn Store> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url)
                .await
                .expect("failed to connect to REDIS_URL");
            Arc::new(store)
        }
        None => Arc::new(MemoryStore::new()),
    }
}

#[cfg(not(feature = "redis-backend"))]
async fn build_store(_config: &Config) -> Arc<dyn Store> {
    Arc::new(MemoryStore::new())
}
