//! Domain-specific configuration modules

pub mod cache;
pub mod cors;
pub mod http;
pub mod jwt;
pub mod logging;
pub mod session;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Melware configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MelwareConfig {
    /// Cross-origin policy
    #[serde(default)]
    pub cors: cors::CorsConfig,

    /// JWT authentication (optional, requires a secret)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<jwt::JwtConfig>,

    /// Session cookies and storage
    #[serde(default)]
    pub session: session::SessionConfig,

    /// Cache store
    #[serde(default)]
    pub cache: cache::CacheConfig,

    /// Gzip compression
    #[serde(default)]
    pub compression: http::CompressionConfig,

    /// Favicon serving (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<http::FaviconConfig>,

    /// Request logging
    #[serde(default)]
    pub request_log: http::RequestLogConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl MelwareConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.cors.validate()?;
        self.session.validate()?;
        self.cache.validate()?;
        self.compression.validate()?;
        self.request_log.validate()?;
        self.logging.validate()?;

        if let Some(ref jwt) = self.jwt {
            jwt.validate()?;
        }

        if let Some(ref favicon) = self.favicon {
            favicon.validate()?;
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = MelwareConfig::default();
        serde_yaml::to_string(&config).unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
