//! `/favicon.ico` serving with caching headers

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{
        header::{ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
        HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use melware_config::FaviconConfig;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ConfigurationError;

pub const FAVICON_PATH: &str = "/favicon.ico";

/// Icon bytes and their precomputed validators
#[derive(Debug, Clone)]
pub struct Favicon {
    data: Bytes,
    etag: HeaderValue,
    cache_control: HeaderValue,
}

impl Favicon {
    /// Read the icon once from disk
    pub fn from_file(path: impl AsRef<Path>, max_age: Duration) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| ConfigurationError::Favicon {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_bytes(data, max_age))
    }

    pub fn from_config(config: &FaviconConfig) -> Result<Self, ConfigurationError> {
        Self::from_file(&config.path, config.max_age)
    }

    pub fn from_bytes(data: impl Into<Bytes>, max_age: Duration) -> Self {
        let data = data.into();
        let etag = format!("\"{:x}\"", Sha256::digest(&data));
        let cache_control = format!("public, max-age={}", max_age.as_secs());

        Self {
            data,
            // Hex digits and decimal numbers are always valid header values
            etag: HeaderValue::from_str(&etag).unwrap_or_else(|_| HeaderValue::from_static("\"\"")),
            cache_control: HeaderValue::from_str(&cache_control)
                .unwrap_or_else(|_| HeaderValue::from_static("public")),
        }
    }

    pub fn etag(&self) -> &HeaderValue {
        &self.etag
    }

    fn respond(&self, request: &Request) -> Response {
        let method = request.method();
        if method != Method::GET && method != Method::HEAD {
            let status = if method == Method::OPTIONS {
                StatusCode::OK
            } else {
                StatusCode::METHOD_NOT_ALLOWED
            };
            return (
                status,
                [
                    (ALLOW, HeaderValue::from_static("GET, HEAD, OPTIONS")),
                    (CONTENT_LENGTH, HeaderValue::from_static("0")),
                ],
            )
                .into_response();
        }

        let not_modified = request
            .headers()
            .get(IF_NONE_MATCH)
            .is_some_and(|tag| *tag == self.etag);
        if not_modified {
            return (
                StatusCode::NOT_MODIFIED,
                [(CACHE_CONTROL, self.cache_control.clone())],
            )
                .into_response();
        }

        (
            StatusCode::OK,
            [
                (CACHE_CONTROL, self.cache_control.clone()),
                (ETAG, self.etag.clone()),
                (CONTENT_TYPE, HeaderValue::from_static("image/x-icon")),
            ],
            Body::from(self.data.clone()),
        )
            .into_response()
    }
}

/// Answer `/favicon.ico`; every other path passes through
pub async fn favicon_middleware(State(favicon): State<Arc<Favicon>>, request: Request, next: Next) -> Response {
    if request.uri().path() != FAVICON_PATH {
        return next.run(request).await;
    }
    favicon.respond(&request)
}
