//! Cache store configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Process-local store
    InMemory,

    /// Redis server
    Redis,
}

impl Default for CacheBackend {
    fn default() -> Self {
        CacheBackend::InMemory
    }
}

impl std::str::FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheBackend::InMemory),
            "redis" => Ok(CacheBackend::Redis),
            _ => Err(format!("Invalid cache backend: {}", s)),
        }
    }
}

/// Cache configuration shared by the response cache and session storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable response caching
    pub enabled: bool,

    /// Backend for cached values
    pub backend: CacheBackend,

    /// Prefix for response cache keys
    pub key_prefix: String,

    /// TTL for entries stored with the default expiration
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub default_ttl: Duration,

    /// Sweep interval for expired in-memory entries
    #[serde(
        with = "crate::domains::utils::serde_duration_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub cleanup_interval: Option<Duration>,

    /// Redis connection URL, required for the redis backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,

    /// Largest response body the response cache will buffer
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::InMemory,
            key_prefix: "melware_cache".to_string(),
            default_ttl: Duration::from_secs(300),
            cleanup_interval: Some(Duration::from_secs(60)),
            redis_url: None,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl Validatable for CacheConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.key_prefix, "key_prefix", self.domain_name())?;

        if self.default_ttl.is_zero() {
            return Err(self.validation_error("default_ttl must be greater than 0"));
        }

        if matches!(self.cleanup_interval, Some(interval) if interval.is_zero()) {
            return Err(self.validation_error("cleanup_interval must be greater than 0"));
        }

        if self.backend == CacheBackend::Redis {
            let url = self
                .redis_url
                .as_deref()
                .ok_or_else(|| self.validation_error("redis_url is required for the redis backend"))?;
            validate_url(url, &["redis", "rediss"], "redis_url", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "cache"
    }
}
