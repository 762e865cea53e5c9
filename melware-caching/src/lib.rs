//! Key/value cache stores for Melware
//!
//! Stores speak bytes behind the object-safe [`CacheStore`] trait so the
//! response cache and session layer can share one `Arc<dyn CacheStore>`
//! regardless of backend.

pub mod cache;
pub mod errors;
pub mod stats;
pub mod stores;

pub use cache::{CacheStore, CacheStoreExt, Expiration};
pub use errors::{CacheError, CacheResult};
pub use stats::CacheStats;
pub use stores::InMemoryStore;

#[cfg(feature = "redis")]
pub use stores::RedisStore;

use melware_config::{CacheBackend, CacheConfig};
use std::sync::Arc;

/// Build the store selected by `config`.
///
/// The in-memory backend spawns its sweeper when a cleanup interval is
/// configured, so call this from within a tokio runtime.
pub async fn create_store(config: &CacheConfig) -> CacheResult<Arc<dyn CacheStore>> {
    match config.backend {
        CacheBackend::InMemory => {
            let store = match config.cleanup_interval {
                Some(interval) if !interval.is_zero() => {
                    InMemoryStore::with_cleanup(Some(config.default_ttl), interval)
                }
                _ => InMemoryStore::new(Some(config.default_ttl)),
            };
            Ok(Arc::new(store))
        }
        CacheBackend::Redis => create_redis_store(config).await,
    }
}

#[cfg(feature = "redis")]
async fn create_redis_store(config: &CacheConfig) -> CacheResult<Arc<dyn CacheStore>> {
    let url = config
        .redis_url
        .as_deref()
        .ok_or_else(|| CacheError::InvalidConfiguration("redis backend requires redis_url".to_string()))?;
    Ok(Arc::new(RedisStore::connect(url, Some(config.default_ttl)).await?))
}

#[cfg(not(feature = "redis"))]
async fn create_redis_store(_config: &CacheConfig) -> CacheResult<Arc<dyn CacheStore>> {
    Err(CacheError::InvalidConfiguration(
        "redis backend requested but melware-caching was built without the `redis` feature".to_string(),
    ))
}
