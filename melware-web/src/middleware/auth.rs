//! JWT Authentication middleware
//!
//! [`JwtAuth`] holds the signing keys and the application's
//! [`Authenticator`]. It is shared as `Arc<JwtAuth>` state by
//! [`jwt_middleware`], [`login_handler`] and [`refresh_handler`].

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::WWW_AUTHENTICATE, request::Parts, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use melware_config::{JwtConfig, Validatable};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{ConfigurationError, WebError};
use crate::utils::get_cookie;

/// Claims carried by every token.
///
/// Values returned by [`Authenticator::payload`] are flattened alongside the
/// registered claims.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JwtClaims {
    /// User ID
    pub id: String,
    /// Expiration time
    pub exp: i64,
    /// Issued at
    pub iat: i64,
    /// Application payload
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// Authenticated user ID, inserted into request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

/// Login request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Login and refresh response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    /// RFC 3339 expiry
    pub expires_at: String,
}

/// Application hooks used by the JWT middleware
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Check credentials, returning the user ID on success
    async fn authenticate(&self, credentials: &Credentials) -> Option<String>;

    /// Decide whether an authenticated user may access the request
    async fn authorize(&self, _user_id: &str, _request: &Parts) -> bool {
        true
    }

    /// Extra claims to embed in the token at login
    async fn payload(&self, _user_id: &str) -> Map<String, Value> {
        Map::new()
    }
}

#[derive(Debug, Clone)]
enum TokenSource {
    Header(HeaderName),
    Query(String),
    Cookie(String),
}

/// JWT token manager
pub struct JwtAuth {
    config: JwtConfig,
    algorithm: Algorithm,
    token_source: TokenSource,
    www_authenticate: HeaderValue,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    authenticator: Arc<dyn Authenticator>,
}

impl JwtAuth {
    /// Create a new JWT manager
    pub fn new(config: JwtConfig, authenticator: Arc<dyn Authenticator>) -> Result<Self, ConfigurationError> {
        config
            .validate()
            .map_err(|e| ConfigurationError::Jwt(e.to_string()))?;

        let algorithm = Algorithm::from_str(&config.signing_algorithm)
            .map_err(|_| ConfigurationError::Jwt(format!("unknown algorithm {}", config.signing_algorithm)))?;

        let (source, name) = config
            .token_lookup_parts()
            .ok_or_else(|| ConfigurationError::Jwt(format!("invalid token lookup {}", config.token_lookup)))?;
        let token_source = match source {
            "header" => TokenSource::Header(
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| ConfigurationError::Jwt(format!("invalid header name {}", name)))?,
            ),
            "query" => TokenSource::Query(name.to_string()),
            "cookie" => TokenSource::Cookie(name.to_string()),
            other => return Err(ConfigurationError::Jwt(format!("invalid token source {}", other))),
        };

        let realm = format!("JWT realm={}", config.realm);
        let www_authenticate =
            HeaderValue::from_str(&realm).map_err(|_| ConfigurationError::InvalidHeaderValue {
                name: WWW_AUTHENTICATE.to_string(),
                value: realm.clone(),
            })?;

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Ok(Self {
            config,
            algorithm,
            token_source,
            www_authenticate,
            encoding_key,
            decoding_key,
            authenticator,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Sign claims with the configured algorithm
    pub fn sign(&self, claims: &JwtClaims) -> Result<String, WebError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| WebError::internal(format!("Failed to sign JWT token: {}", e)))
    }

    /// Issue a fresh token for `user_id`, embedding the authenticator's payload
    pub async fn generate_token(&self, user_id: &str) -> Result<(String, DateTime<Utc>), WebError> {
        let now = Utc::now();
        let expires_at = self.expiry_from(now)?;

        let mut payload = self.authenticator.payload(user_id).await;
        for reserved in ["id", "exp", "iat"] {
            payload.remove(reserved);
        }

        let claims = JwtClaims {
            id: user_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            payload,
        };

        Ok((self.sign(&claims)?, expires_at))
    }

    /// Verify and decode a token
    pub fn verify_token(&self, token: &str) -> Result<JwtClaims, WebError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => WebError::unauthorized("Token is expired"),
                ErrorKind::InvalidAlgorithm => WebError::unauthorized("invalid signing algorithm"),
                _ => {
                    debug!("JWT verification failed: {}", e);
                    WebError::unauthorized("Invalid token")
                }
            })
    }

    /// Pull the raw token from the configured location
    fn extract_token(&self, parts: &Parts) -> Result<String, WebError> {
        match &self.token_source {
            TokenSource::Header(name) => {
                let value = parts
                    .headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if value.is_empty() {
                    return Err(WebError::unauthorized("auth header is empty"));
                }
                match value.split_once(' ') {
                    Some(("Bearer", token)) if !token.is_empty() => Ok(token.to_string()),
                    _ => Err(WebError::unauthorized("auth header is invalid")),
                }
            }
            TokenSource::Query(name) => {
                let token = parts
                    .uri
                    .query()
                    .and_then(|query| {
                        url::form_urlencoded::parse(query.as_bytes())
                            .find(|(key, _)| key == name.as_str())
                            .map(|(_, value)| value.into_owned())
                    })
                    .unwrap_or_default();
                if token.is_empty() {
                    return Err(WebError::unauthorized("query token is empty"));
                }
                Ok(token)
            }
            TokenSource::Cookie(name) => match get_cookie(&parts.headers, name) {
                Some(token) if !token.is_empty() => Ok(token),
                _ => Err(WebError::unauthorized("cookie token is empty")),
            },
        }
    }

    /// Error response carrying the realm challenge
    pub fn reject(&self, error: WebError) -> Response {
        let mut response = error.into_response();
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, self.www_authenticate.clone());
        response
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, WebError> {
        chrono::Duration::from_std(self.config.timeout)
            .ok()
            .and_then(|timeout| now.checked_add_signed(timeout))
            .ok_or_else(|| WebError::internal("JWT timeout is out of range"))
    }

    /// Oldest `iat` that may still be refreshed
    fn refresh_cutoff(&self, now: DateTime<Utc>) -> i64 {
        chrono::Duration::from_std(self.config.max_refresh)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .map(|cutoff| cutoff.timestamp())
            .unwrap_or(i64::MIN)
    }
}

fn token_response(token: String, expires_at: DateTime<Utc>) -> Json<TokenResponse> {
    Json(TokenResponse {
        token,
        expires_at: expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

/// Authentication middleware
pub async fn jwt_middleware(State(auth): State<Arc<JwtAuth>>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let claims = match auth
        .extract_token(&parts)
        .and_then(|token| auth.verify_token(&token))
    {
        Ok(claims) => claims,
        Err(e) => return auth.reject(e),
    };

    let user_id = claims.id.clone();
    parts.extensions.insert(claims);
    parts.extensions.insert(UserId(user_id.clone()));

    if !auth.authenticator.authorize(&user_id, &parts).await {
        warn!(user_id = %user_id, path = %parts.uri.path(), "JWT authorization denied");
        return auth.reject(WebError::forbidden("You don't have permission to access."));
    }

    next.run(Request::from_parts(parts, body)).await
}

/// Exchange credentials for a token
pub async fn login_handler(
    State(auth): State<Arc<JwtAuth>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<TokenResponse>, Response> {
    let Some(user_id) = auth.authenticator.authenticate(&credentials).await else {
        debug!(username = %credentials.username, "JWT login rejected");
        return Err(auth.reject(WebError::unauthorized("Incorrect username or password")));
    };

    let (token, expires_at) = auth.generate_token(&user_id).await.map_err(|e| auth.reject(e))?;
    Ok(token_response(token, expires_at))
}

/// Re-sign the current token with a new expiry.
///
/// Must sit behind [`jwt_middleware`]; the refresh window is measured from
/// the original `iat`.
pub async fn refresh_handler(
    State(auth): State<Arc<JwtAuth>>,
    claims: JwtClaims,
) -> Result<Json<TokenResponse>, Response> {
    let now = Utc::now();
    if claims.iat < auth.refresh_cutoff(now) {
        return Err(auth.reject(WebError::unauthorized("Token is expired")));
    }

    let expires_at = auth.expiry_from(now).map_err(|e| auth.reject(e))?;
    let refreshed = JwtClaims {
        exp: expires_at.timestamp(),
        ..claims
    };

    let token = auth.sign(&refreshed).map_err(|e| auth.reject(e))?;
    Ok(token_response(token, expires_at))
}

impl<S: Send + Sync> FromRequestParts<S> for JwtClaims {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<JwtClaims>()
            .cloned()
            .ok_or_else(|| WebError::unauthorized("Authentication required"))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserId>()
            .cloned()
            .ok_or_else(|| WebError::unauthorized("Authentication required"))
    }
}
