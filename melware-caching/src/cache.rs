//! Core cache store trait and types

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::{CacheResult, CacheStats};

/// How long a stored value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// The store's configured default TTL
    Default,

    /// Never expires
    Never,

    /// Expires after the given duration
    After(Duration),
}

impl From<Duration> for Expiration {
    fn from(ttl: Duration) -> Self {
        Expiration::After(ttl)
    }
}

/// Byte-oriented key/value store.
///
/// Every backend speaks bytes so the trait stays object safe; typed access
/// goes through [`CacheStoreExt`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value, `None` on a miss or an expired entry
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store a value, replacing any existing one
    async fn set(&self, key: &str, value: Vec<u8>, expiration: Expiration) -> CacheResult<()>;

    /// Remove a value; missing keys are not an error
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Remove every value
    async fn clear(&self) -> CacheResult<()>;

    /// Check if a key holds a live value
    async fn contains_key(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Statistics, when the backend tracks them
    fn stats(&self) -> Option<CacheStats> {
        None
    }

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// JSON-typed helpers over any [`CacheStore`]
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    async fn get_json<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T>(&self, key: &str, value: &T, expiration: Expiration) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes, expiration).await
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}
