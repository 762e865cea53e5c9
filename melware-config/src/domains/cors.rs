//! CORS policy configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cross-origin resource sharing configuration.
///
/// This is the raw, user-facing shape. Normalization and the origin rules
/// are applied when a `CorsPolicy` is built from it in `melware-web`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins, or `["*"]` for any origin
    pub allow_origins: Vec<String>,

    /// Allowed methods for preflight requests
    pub allow_methods: Vec<String>,

    /// Allowed request headers for preflight requests
    pub allow_headers: Vec<String>,

    /// Response headers exposed to the browser
    pub expose_headers: Vec<String>,

    /// Whether credentials are allowed
    pub allow_credentials: bool,

    /// How long a preflight result may be cached; zero omits the directive
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub max_age: Duration,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: vec!["GET".to_string(), "POST".to_string(), "HEAD".to_string()],
            allow_headers: vec![
                "Origin".to_string(),
                "Accept".to_string(),
                "Content-Type".to_string(),
            ],
            expose_headers: Vec::new(),
            allow_credentials: false,
            max_age: Duration::from_secs(12 * 60 * 60),
        }
    }
}

impl CorsConfig {
    /// Permissive configuration: any origin, the common methods, any header
    pub fn allow_all() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: ["HEAD", "GET", "POST", "PUT", "PATCH", "DELETE"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allow_headers: vec!["*".to_string()],
            ..Default::default()
        }
    }

    /// Default configuration restricted to the given origins
    pub fn with_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow_origins: origins.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

impl Validatable for CorsConfig {
    fn validate(&self) -> ConfigResult<()> {
        for method in &self.allow_methods {
            let method = method.trim();
            if !method.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                return Err(self.validation_error(format!("'{}' is not a valid HTTP method token", method)));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "cors"
    }
}
