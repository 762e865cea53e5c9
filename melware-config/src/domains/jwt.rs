//! JWT authentication configuration

use crate::error::ConfigResult;
use crate::validation::{validate_enum_choice, validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Signing algorithms accepted for shared-secret tokens
pub const SUPPORTED_ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];

/// Token sources accepted in `token_lookup`
pub const TOKEN_SOURCES: [&str; 3] = ["header", "query", "cookie"];

/// JWT authentication configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Realm reported in `WWW-Authenticate`
    pub realm: String,

    /// Signing algorithm name
    pub signing_algorithm: String,

    /// Shared secret used for signing and verification
    pub secret: String,

    /// Token lifetime
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub timeout: Duration,

    /// Window after issue during which a token may be refreshed; zero disables refresh
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub max_refresh: Duration,

    /// Where to read the token from, as `<source>:<name>`
    pub token_lookup: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            realm: String::new(),
            signing_algorithm: "HS256".to_string(),
            secret: String::new(),
            timeout: Duration::from_secs(60 * 60),
            max_refresh: Duration::ZERO,
            token_lookup: "header:Authorization".to_string(),
        }
    }
}

impl JwtConfig {
    /// Default configuration with the given secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// Split `token_lookup` into its source and name
    pub fn token_lookup_parts(&self) -> Option<(&str, &str)> {
        let (source, name) = self.token_lookup.split_once(':')?;
        let (source, name) = (source.trim(), name.trim());
        if name.is_empty() {
            return None;
        }
        Some((source, name))
    }
}

impl Validatable for JwtConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.secret, "secret", self.domain_name())?;
        validate_enum_choice(
            &self.signing_algorithm,
            &SUPPORTED_ALGORITHMS,
            "signing_algorithm",
            self.domain_name(),
        )?;
        validate_positive(self.timeout.as_secs(), "timeout", self.domain_name())?;

        let (source, _) = self.token_lookup_parts().ok_or_else(|| {
            self.validation_error(format!(
                "token_lookup '{}' must have the form <source>:<name>",
                self.token_lookup
            ))
        })?;
        validate_enum_choice(source, &TOKEN_SOURCES, "token_lookup", self.domain_name())?;

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "jwt"
    }
}
