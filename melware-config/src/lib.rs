//! Domain-driven configuration for Melware middlewares
//!
//! Every middleware in `melware-web` is configured from one of the domain
//! structs in this crate. Configurations can be assembled in code, read from
//! a YAML file, or overridden from `MELWARE_`-prefixed environment variables.

pub mod error;
pub mod loader;
pub mod validation;

pub mod domains;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

pub use domains::{
    cache::{CacheBackend, CacheConfig},
    cors::CorsConfig,
    http::{CompressionConfig, CompressionLevel, FaviconConfig, RequestLogConfig},
    jwt::JwtConfig,
    logging::{LogFormat, LogLevel, LogTarget, LoggingConfig},
    session::{SessionConfig, SessionStoreKind},
    MelwareConfig,
};

pub use domains::utils::{serde_duration, serde_duration_option};
