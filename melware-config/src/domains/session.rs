//! Session cookie and storage configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest secret accepted for signing and encrypting session cookies
pub const MIN_SECRET_LEN: usize = 32;

/// Where session values are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStoreKind {
    /// In the cache store, keyed by the id in the cookie
    #[default]
    Cache,

    /// In the cookie itself, encrypted with `secret`
    Cookie,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie carrying the session id
    pub cookie_name: String,

    /// Cookie path
    pub path: String,

    /// Cookie domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Cookie and record lifetime in seconds.
    /// Zero omits `Max-Age`, negative deletes the session.
    pub max_age: i64,

    /// Only send the cookie over HTTPS
    pub secure: bool,

    /// Hide the cookie from scripts
    pub http_only: bool,

    /// Prefix applied to session ids in the backing store
    pub key_prefix: String,

    /// Upper bound on the serialized session size in bytes; zero disables the check
    pub max_length: usize,

    /// Store TTL used when `max_age` is zero
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub default_ttl: Duration,

    /// Backing store for session values
    pub store: SessionStoreKind,

    /// Signs the session id cookie (and encrypts cookie-stored sessions).
    /// Unset leaves cache-store ids unsigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "melware_session".to_string(),
            path: "/".to_string(),
            domain: None,
            max_age: 86400 * 30,
            secure: false,
            http_only: true,
            key_prefix: "session_".to_string(),
            max_length: 4096,
            default_ttl: Duration::from_secs(60 * 20),
            store: SessionStoreKind::Cache,
            secret: None,
        }
    }
}

impl Validatable for SessionConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.cookie_name, "cookie_name", self.domain_name())?;

        let valid_name = self
            .cookie_name
            .chars()
            .all(|c| c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?={}".contains(c));
        if !valid_name {
            return Err(self.validation_error(format!(
                "cookie_name '{}' contains characters not allowed in a cookie name",
                self.cookie_name
            )));
        }

        if !self.path.starts_with('/') {
            return Err(self.validation_error("path must start with '/'"));
        }

        if self.default_ttl.is_zero() {
            return Err(self.validation_error("default_ttl must be greater than 0"));
        }

        match self.secret.as_deref() {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(self.validation_error(format!(
                    "secret must be at least {} bytes",
                    MIN_SECRET_LEN
                )));
            }
            None if self.store == SessionStoreKind::Cookie => {
                return Err(self.validation_error("the cookie store requires a secret"));
            }
            _ => {}
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "session"
    }
}
