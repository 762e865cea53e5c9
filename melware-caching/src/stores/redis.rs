//! Redis-backed store

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::time::Duration;
use tracing::info;

use crate::{
    cache::{CacheStore, Expiration},
    CacheError, CacheResult,
};

/// Store backed by a Redis database over a multiplexed async connection.
///
/// `clear` issues `FLUSHDB`, so point it at a database Melware owns.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    default_ttl: Option<Duration>,
}

impl RedisStore {
    /// Connect to `url` and verify the server answers `PING`
    pub async fn connect(url: &str, default_ttl: Option<Duration>) -> CacheResult<Self> {
        let client = Client::open(url).map_err(|e| CacheError::InvalidConfiguration(e.to_string()))?;
        let mut connection = client.get_multiplexed_async_connection().await?;

        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        info!("Connected to Redis cache store");

        Ok(Self {
            connection,
            default_ttl,
        })
    }

    fn ttl_seconds(&self, expiration: Expiration) -> Option<u64> {
        let ttl = match expiration {
            Expiration::Default => self.default_ttl,
            Expiration::Never => None,
            Expiration::After(ttl) => Some(ttl),
        };
        // Redis rejects EX 0; sub-second TTLs round up to one second
        ttl.map(|ttl| ttl.as_secs().max(1))
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiration: Expiration) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        match self.ttl_seconds(expiration) {
            Some(seconds) => {
                let _: () = conn.set_ex(key, value, seconds).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
