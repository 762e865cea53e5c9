//! Whole-response caching keyed by request URI

use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use melware_caching::{CacheStore, CacheStoreExt, Expiration};
use melware_config::CacheConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// URIs longer than this are hashed before being used as keys
const MAX_KEY_URI_LEN: usize = 200;

/// A response as stored in the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
                headers.append(name, value);
            }
        }
        response
    }
}

/// Shared state for [`response_cache_middleware`]
pub struct ResponseCache {
    key_prefix: String,
    store: Arc<dyn CacheStore>,
    ttl: Expiration,
    max_body_bytes: usize,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            store,
            ttl: Expiration::Default,
            max_body_bytes: 1024 * 1024,
        }
    }

    /// `None` when response caching is switched off
    pub fn from_config(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            debug!("Response caching is disabled");
            return None;
        }
        Some(Self::new(store, config.key_prefix.clone()).with_max_body_bytes(config.max_body_bytes))
    }

    /// How long cached responses live; the store's default otherwise
    pub fn with_ttl(mut self, ttl: impl Into<Expiration>) -> Self {
        self.ttl = ttl.into();
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// `"{prefix}:{uri}"`, with long URIs replaced by their SHA-256 hex digest
    pub fn cache_key(&self, uri: &str) -> String {
        if uri.len() > MAX_KEY_URI_LEN {
            format!("{}:{:x}", self.key_prefix, Sha256::digest(uri.as_bytes()))
        } else {
            format!("{}:{}", self.key_prefix, uri)
        }
    }

    async fn lookup(&self, key: &str) -> Option<CachedResponse> {
        match self.store.get_json::<CachedResponse>(key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Response cache lookup for {} failed: {}", key, e);
                None
            }
        }
    }

    async fn store(&self, key: &str, cached: &CachedResponse) {
        if let Err(e) = self.store.set_json(key, cached, self.ttl).await {
            warn!("Caching response for {} failed: {}", key, e);
        }
    }
}

/// Replay cached `GET`/`HEAD` responses, caching successful `GET` responses on a miss
pub async fn response_cache_middleware(
    State(cache): State<Arc<ResponseCache>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if method != Method::GET && method != Method::HEAD {
        return next.run(request).await;
    }

    let uri = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let key = cache.cache_key(&uri);

    if let Some(cached) = cache.lookup(&key).await {
        debug!("Response cache hit for {}", key);
        return cached.into_response();
    }

    let response = next.run(request).await;

    // A HEAD response has no body worth storing under the shared key
    if method != Method::GET || !response.status().is_success() {
        return response;
    }

    let fits = response
        .body()
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= cache.max_body_bytes as u64);
    if !fits {
        debug!("Response for {} is too large or unbounded, not caching", key);
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, cache.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to buffer response for {}: {}", key, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
        body: bytes.to_vec(),
    };
    cache.store(&key, &cached).await;

    Response::from_parts(parts, Body::from(bytes))
}
