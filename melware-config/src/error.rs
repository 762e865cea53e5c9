//! Configuration error types

use thiserror::Error;

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file: {0}")]
    FileReadError(#[from] std::io::Error),

    /// The YAML document is malformed or has the wrong shape
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A `MELWARE_` override could not be parsed
    #[error("Environment variable error: {0}")]
    EnvError(String),

    /// A domain section failed validation
    #[error("Domain configuration error in {domain}: {message}")]
    DomainError { domain: String, message: String },
}
