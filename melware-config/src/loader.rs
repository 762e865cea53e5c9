//! Configuration loading and environment variable handling

use crate::domains::utils::split_list;
use crate::domains::MelwareConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "MELWARE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<MelwareConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml(&content)
    }

    /// Load configuration from YAML text with environment overrides
    pub fn from_yaml(&self, content: &str) -> ConfigResult<MelwareConfig> {
        let mut config: MelwareConfig = serde_yaml::from_str(content)?;
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<MelwareConfig> {
        let mut config = MelwareConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<MelwareConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut MelwareConfig) -> ConfigResult<()> {
        self.apply_cors_overrides(&mut config.cors);
        self.apply_jwt_overrides(config);
        self.apply_cache_overrides(&mut config.cache)?;
        self.apply_session_overrides(&mut config.session);
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_cors_overrides(&self, config: &mut crate::domains::cors::CorsConfig) {
        if let Ok(origins) = self.get_env_var("CORS_ALLOW_ORIGINS") {
            config.allow_origins = split_list(&origins);
        }

        if let Ok(methods) = self.get_env_var("CORS_ALLOW_METHODS") {
            config.allow_methods = split_list(&methods);
        }
    }

    /// A secret in the environment enables JWT even when the file has no `jwt` section
    fn apply_jwt_overrides(&self, config: &mut MelwareConfig) {
        if let Ok(secret) = self.get_env_var("JWT_SECRET") {
            config.jwt.get_or_insert_with(Default::default).secret = secret;
        }
    }

    fn apply_cache_overrides(&self, config: &mut crate::domains::cache::CacheConfig) -> ConfigResult<()> {
        if let Ok(backend) = self.get_env_var("CACHE_BACKEND") {
            config.backend = crate::domains::cache::CacheBackend::from_str(&backend).map_err(ConfigError::EnvError)?;
        }

        if let Ok(url) = self.get_env_var("REDIS_URL") {
            config.redis_url = Some(url);
        }

        if let Ok(ttl) = self.get_env_var("CACHE_DEFAULT_TTL") {
            let seconds: u64 = ttl
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid CACHE_DEFAULT_TTL: {}", e)))?;
            config.default_ttl = std::time::Duration::from_secs(seconds);
        }

        Ok(())
    }

    fn apply_session_overrides(&self, config: &mut crate::domains::session::SessionConfig) {
        if let Ok(name) = self.get_env_var("SESSION_COOKIE_NAME") {
            config.cookie_name = name;
        }

        if let Ok(secret) = self.get_env_var("SESSION_SECRET") {
            config.secret = Some(secret);
        }
    }

    fn apply_logging_overrides(&self, config: &mut crate::domains::logging::LoggingConfig) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
