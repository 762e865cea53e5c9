//! CORS policy evaluation
//!
//! A [`CorsPolicy`] is built once from a [`CorsConfig`], validated, and then
//! shared behind an `Arc` as the state of [`cors_middleware`]. Both response
//! header sets are computed at construction so request handling only copies
//! prebuilt headers.

use axum::{
    extract::{Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, ORIGIN, VARY,
        },
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use melware_config::{CorsConfig, Validatable};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::errors::ConfigurationError;

/// Fallback check for origins that are not in the configured list
pub type OriginPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Validated, immutable CORS policy
pub struct CorsPolicy {
    allow_origins: Vec<String>,
    allow_origin_predicate: Option<OriginPredicate>,
    allow_methods: Vec<String>,
    allow_headers: Vec<String>,
    expose_headers: Vec<String>,
    allow_credentials: bool,
    max_age: Duration,
    allow_all_origins: bool,
    normal_headers: HeaderMap,
    preflight_headers: HeaderMap,
}

impl fmt::Debug for CorsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorsPolicy")
            .field("allow_origins", &self.allow_origins)
            .field("has_origin_predicate", &self.allow_origin_predicate.is_some())
            .field("allow_methods", &self.allow_methods)
            .field("allow_headers", &self.allow_headers)
            .field("expose_headers", &self.expose_headers)
            .field("allow_credentials", &self.allow_credentials)
            .field("max_age", &self.max_age)
            .field("allow_all_origins", &self.allow_all_origins)
            .finish()
    }
}

impl CorsPolicy {
    /// Build a policy without an origin predicate
    pub fn new(config: CorsConfig) -> Result<Self, ConfigurationError> {
        Self::build(config, None)
    }

    /// Build a policy that consults `predicate` for unlisted origins
    pub fn with_predicate<F>(config: CorsConfig, predicate: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::build(config, Some(Arc::new(predicate)))
    }

    fn build(config: CorsConfig, predicate: Option<OriginPredicate>) -> Result<Self, ConfigurationError> {
        config
            .validate()
            .map_err(|e| ConfigurationError::Cors(e.to_string()))?;

        let allow_origins = normalize_strs(&config.allow_origins);
        let allow_all_origins = validate_allow_origins(&allow_origins, predicate.is_some())?;

        let mut policy = Self {
            allow_origins,
            allow_origin_predicate: predicate,
            allow_methods: normalize_strs(&config.allow_methods)
                .iter()
                .map(|m| m.to_uppercase())
                .collect(),
            allow_headers: normalize_strs(&config.allow_headers)
                .iter()
                .map(|h| canonical_header_name(h))
                .collect(),
            expose_headers: normalize_strs(&config.expose_headers)
                .iter()
                .map(|h| canonical_header_name(h))
                .collect(),
            allow_credentials: config.allow_credentials,
            max_age: config.max_age,
            allow_all_origins,
            normal_headers: HeaderMap::new(),
            preflight_headers: HeaderMap::new(),
        };

        policy.normal_headers = policy.generate_normal_headers()?;
        policy.preflight_headers = policy.generate_preflight_headers()?;

        debug!(policy = ?policy, "CORS policy constructed");
        Ok(policy)
    }

    /// Headers added to every allowed non-preflight response
    pub fn generate_normal_headers(&self) -> Result<HeaderMap, ConfigurationError> {
        let mut headers = HeaderMap::new();

        if self.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if !self.expose_headers.is_empty() {
            headers.insert(
                ACCESS_CONTROL_EXPOSE_HEADERS,
                header_value(&ACCESS_CONTROL_EXPOSE_HEADERS, &self.expose_headers.join(","))?,
            );
        }
        if self.allow_all_origins {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        } else {
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }

        Ok(headers)
    }

    /// Headers sent on an allowed preflight (`OPTIONS`) response
    pub fn generate_preflight_headers(&self) -> Result<HeaderMap, ConfigurationError> {
        let mut headers = HeaderMap::new();

        if self.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if !self.allow_methods.is_empty() {
            headers.insert(
                ACCESS_CONTROL_ALLOW_METHODS,
                header_value(&ACCESS_CONTROL_ALLOW_METHODS, &self.allow_methods.join(","))?,
            );
        }
        if !self.allow_headers.is_empty() {
            headers.insert(
                ACCESS_CONTROL_ALLOW_HEADERS,
                header_value(&ACCESS_CONTROL_ALLOW_HEADERS, &self.allow_headers.join(","))?,
            );
        }
        let max_age = self.max_age.as_secs();
        if max_age > 0 {
            headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age));
        }
        if self.allow_all_origins {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        } else {
            headers.append(VARY, HeaderValue::from_static("Origin"));
            headers.append(VARY, HeaderValue::from_static("Access-Control-Request-Method"));
            headers.append(VARY, HeaderValue::from_static("Access-Control-Request-Headers"));
        }

        Ok(headers)
    }

    /// Whether a request from `origin` may proceed
    pub fn validate_origin(&self, origin: &str) -> bool {
        if self.allow_all_origins {
            return true;
        }
        if self.allow_origins.iter().any(|allowed| allowed == origin) {
            return true;
        }
        match &self.allow_origin_predicate {
            Some(predicate) => predicate(origin),
            None => false,
        }
    }

    pub fn allow_all_origins(&self) -> bool {
        self.allow_all_origins
    }

    pub fn allow_origins(&self) -> &[String] {
        &self.allow_origins
    }

    pub fn allow_methods(&self) -> &[String] {
        &self.allow_methods
    }

    pub fn allow_headers(&self) -> &[String] {
        &self.allow_headers
    }

    pub fn expose_headers(&self) -> &[String] {
        &self.expose_headers
    }

    pub fn normal_headers(&self) -> &HeaderMap {
        &self.normal_headers
    }

    pub fn preflight_headers(&self) -> &HeaderMap {
        &self.preflight_headers
    }

    /// Whether the exact request origin is written back to the response
    fn echoes_origin(&self) -> bool {
        !self.allow_all_origins && !self.allow_credentials
    }
}

fn header_value(name: &HeaderName, value: &str) -> Result<HeaderValue, ConfigurationError> {
    HeaderValue::from_str(value).map_err(|_| ConfigurationError::InvalidHeaderValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Trim, lowercase and deduplicate, keeping first-seen order
pub fn normalize_strs<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.as_ref().trim().to_lowercase();
        if !normalized.contains(&value) {
            normalized.push(value);
        }
    }
    normalized
}

/// Check normalized origins and report whether they mean "allow all".
///
/// The rules are exclusive: exactly `["*"]`, then a non-empty list of
/// http(s) origins, then an empty list backed by a predicate.
pub fn validate_allow_origins(origins: &[String], has_predicate: bool) -> Result<bool, ConfigurationError> {
    if origins.len() == 1 && origins[0] == "*" {
        if has_predicate {
            return Err(ConfigurationError::Cors(
                "allow all origins is set, an origin predicate would never be called".to_string(),
            ));
        }
        return Ok(true);
    }

    if !origins.is_empty() {
        if origins.iter().any(|origin| origin == "*") {
            return Err(ConfigurationError::Cors(
                "the wildcard origin '*' cannot be mixed with other origins".to_string(),
            ));
        }
        if let Some(origin) = origins
            .iter()
            .find(|origin| !origin.starts_with("http://") && !origin.starts_with("https://"))
        {
            return Err(ConfigurationError::Cors(format!(
                "origin '{}' must start with http:// or https://",
                origin
            )));
        }
        return Ok(false);
    }

    if !has_predicate {
        return Err(ConfigurationError::Cors(
            "no allowed origins and no origin predicate".to_string(),
        ));
    }
    Ok(false)
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Canonical header capitalization: `content-type` becomes `Content-Type`.
///
/// Names containing non-token bytes are returned unchanged.
pub fn canonical_header_name(name: &str) -> String {
    if !name.bytes().all(is_token_byte) {
        return name.to_string();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

/// Per-request CORS evaluation
pub async fn cors_middleware(State(policy): State<Arc<CorsPolicy>>, request: Request, next: Next) -> Response {
    let origin = request.headers().get(ORIGIN).filter(|origin| !origin.is_empty()).cloned();
    let Some(origin) = origin else {
        return next.run(request).await;
    };

    // A non-visible-ASCII origin cannot match anything
    let allowed = origin
        .to_str()
        .map(|origin| policy.validate_origin(origin))
        .unwrap_or(false);

    if !allowed {
        debug!(origin = ?origin, "CORS origin denied");
        return StatusCode::FORBIDDEN.into_response();
    }

    let mut response = if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        for (name, value) in policy.preflight_headers.iter() {
            response.headers_mut().append(name, value.clone());
        }
        response
    } else {
        let mut response = next.run(request).await;
        let headers = response.headers_mut();
        for (name, value) in policy.normal_headers.iter() {
            if *name == VARY {
                headers.append(name, value.clone());
            } else {
                headers.insert(name, value.clone());
            }
        }
        response
    };

    if policy.echoes_origin() {
        response.headers_mut().insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_normalize_strs() {
        let normalized = normalize_strs(&["http://google.com", "http://google.com", "  http://GITHUB.com "]);
        assert_eq!(normalized, strings(&["http://google.com", "http://github.com"]));

        // Idempotent
        assert_eq!(normalize_strs(&normalized), normalized);

        let empty: [&str; 0] = [];
        assert!(normalize_strs(&empty).is_empty());

        // Empty strings survive and are deduplicated like anything else
        assert_eq!(normalize_strs(&["", " ", "a"]), strings(&["", "a"]));
    }

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("x-user"), "X-User");
        assert_eq!(canonical_header_name("xPassword"), "Xpassword");
        assert_eq!(canonical_header_name("content-TYPE"), "Content-Type");
        assert_eq!(canonical_header_name("x--double"), "X--Double");
        assert_eq!(canonical_header_name("*"), "*");
        assert_eq!(canonical_header_name("bad header"), "bad header");
    }

    #[test]
    fn test_validate_allow_origins_rules() {
        assert!(validate_allow_origins(&strings(&["*"]), false).unwrap());
        assert!(validate_allow_origins(&strings(&["*"]), true).is_err());

        assert!(!validate_allow_origins(&strings(&["http://a.com", "https://b.com"]), false).unwrap());
        assert!(validate_allow_origins(&strings(&["*", "http://x.com"]), false).is_err());
        assert!(validate_allow_origins(&strings(&["ftp://x.com"]), false).is_err());
        assert!(validate_allow_origins(&strings(&["example.com"]), false).is_err());

        assert!(!validate_allow_origins(&[], true).unwrap());
        assert!(validate_allow_origins(&[], false).is_err());
    }

    #[test]
    fn test_wildcard_mix_error_names_wildcard() {
        let err = validate_allow_origins(&strings(&["example.com", "*"]), false).unwrap_err();
        assert!(err.to_string().contains("wildcard"));
    }

    #[test]
    fn test_method_and_header_normalization() {
        let config = CorsConfig {
            allow_methods: strings(&[" GeT ", "get", "post", "PUT  ", "Head", "POST"]),
            allow_headers: strings(&["", "Content-type", "Origin", "Content-type", "timeStamp "]),
            expose_headers: strings(&["xPassword", "x-user"]),
            ..CorsConfig::default()
        };
        let policy = CorsPolicy::new(config).unwrap();

        assert_eq!(policy.allow_methods(), strings(&["GET", "POST", "PUT", "HEAD"]).as_slice());
        assert_eq!(
            policy.allow_headers(),
            strings(&["", "Content-Type", "Origin", "Timestamp"]).as_slice()
        );
        assert_eq!(policy.expose_headers(), strings(&["Xpassword", "X-User"]).as_slice());

        let preflight = policy.preflight_headers();
        assert_eq!(preflight[ACCESS_CONTROL_ALLOW_METHODS], "GET,POST,PUT,HEAD");
        assert_eq!(preflight[ACCESS_CONTROL_ALLOW_HEADERS], ",Content-Type,Origin,Timestamp");
        assert_eq!(policy.normal_headers()[ACCESS_CONTROL_EXPOSE_HEADERS], "Xpassword,X-User");
    }

    #[test]
    fn test_default_policy_headers() {
        let policy = CorsPolicy::new(CorsConfig::default()).unwrap();
        assert!(policy.allow_all_origins());

        let normal = policy.normal_headers();
        assert_eq!(normal.len(), 1);
        assert_eq!(normal[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(normal.get(VARY).is_none());

        let preflight = policy.preflight_headers();
        assert_eq!(preflight[ACCESS_CONTROL_MAX_AGE], "43200");
        assert_eq!(preflight[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(preflight[ACCESS_CONTROL_ALLOW_METHODS], "GET,POST,HEAD");
        assert_eq!(preflight[ACCESS_CONTROL_ALLOW_HEADERS], "Origin,Accept,Content-Type");
        assert!(preflight.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }

    #[test]
    fn test_listed_origins_vary() {
        let policy = CorsPolicy::new(CorsConfig::with_origins(["http://a.com"])).unwrap();
        assert!(!policy.allow_all_origins());

        let normal = policy.normal_headers();
        assert_eq!(normal[VARY], "Origin");
        assert!(normal.get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

        let vary: Vec<_> = policy.preflight_headers().get_all(VARY).iter().collect();
        assert_eq!(
            vary,
            vec![
                "Origin",
                "Access-Control-Request-Method",
                "Access-Control-Request-Headers"
            ]
        );
    }

    #[test]
    fn test_credentials_and_zero_max_age() {
        let config = CorsConfig {
            allow_credentials: true,
            max_age: Duration::ZERO,
            allow_methods: Vec::new(),
            allow_headers: Vec::new(),
            ..CorsConfig::default()
        };
        let policy = CorsPolicy::new(config).unwrap();

        assert_eq!(policy.normal_headers()[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        let preflight = policy.preflight_headers();
        assert_eq!(preflight[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert!(preflight.get(ACCESS_CONTROL_MAX_AGE).is_none());
        assert!(preflight.get(ACCESS_CONTROL_ALLOW_METHODS).is_none());
        assert!(preflight.get(ACCESS_CONTROL_ALLOW_HEADERS).is_none());
    }

    #[test]
    fn test_unencodable_header_value_fails_construction() {
        let config = CorsConfig {
            expose_headers: vec!["x-bad\u{7f}name".to_string()],
            ..CorsConfig::default()
        };
        let err = CorsPolicy::new(config).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidHeaderValue { .. }));
    }

    #[test]
    fn test_validate_origin() {
        let policy = CorsPolicy::with_predicate(CorsConfig::with_origins(["http://Google.com"]), |origin| {
            origin == "http://github.com"
        })
        .unwrap();

        assert!(policy.validate_origin("http://google.com"));
        assert!(!policy.validate_origin("http://Google.com"));
        assert!(!policy.validate_origin("https://google.com"));
        assert!(policy.validate_origin("http://github.com"));
        assert!(!policy.validate_origin("http://gitlab.com"));
    }

    #[test]
    fn test_predicate_only_policy() {
        let config = CorsConfig {
            allow_origins: Vec::new(),
            ..CorsConfig::default()
        };
        assert!(CorsPolicy::new(config.clone()).is_err());

        let policy = CorsPolicy::with_predicate(config, |origin| origin.ends_with(".internal")).unwrap();
        assert!(policy.validate_origin("http://api.internal"));
        assert!(!policy.validate_origin("http://api.external"));
    }
}
