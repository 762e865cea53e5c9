//! Configuration for the response-shaping middlewares: compression,
//! favicon serving and request logging

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gzip compression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Favour speed
    Fastest,

    /// Favour size
    Best,

    /// The encoder's default trade-off
    Default,

    /// Explicit gzip level, 0 through 9
    Precise(u8),
}

impl Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel::Default
    }
}

/// Gzip compression configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub level: CompressionLevel,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: CompressionLevel::Default,
        }
    }
}

impl Validatable for CompressionConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let CompressionLevel::Precise(level) = self.level {
            if level > 9 {
                return Err(self.validation_error(format!("gzip level must be between 0 and 9, got {}", level)));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "compression"
    }
}

/// Favicon serving configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaviconConfig {
    /// Path of the icon file
    pub path: String,

    /// `Cache-Control` max-age
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_favicon_max_age")]
    pub max_age: Duration,
}

impl FaviconConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_age: default_favicon_max_age(),
        }
    }
}

impl Validatable for FaviconConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.path, "path", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "favicon"
    }
}

fn default_favicon_max_age() -> Duration {
    Duration::from_secs(60 * 60 * 24 * 365)
}

/// Request logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLogConfig {
    /// Report the completion time in UTC instead of local time
    pub utc: bool,

    /// chrono format string for the completion time
    pub time_format: String,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            utc: true,
            time_format: "%Y-%m-%dT%H:%M:%S%.3f%:z".to_string(),
        }
    }
}

impl Validatable for RequestLogConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.time_format, "time_format", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "request_log"
    }
}
