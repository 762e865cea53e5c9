//! Cookie-identified sessions
//!
//! By default the cookie only carries an opaque id and values live in a
//! [`SessionStore`], normally a [`CacheSessionStore`] over the same
//! `CacheStore` used for response caching. With a secret configured the id
//! is signed, and a forged or altered cookie starts a new session.
//!
//! With [`SessionStoreKind::Cookie`] the values themselves travel in the
//! cookie, encrypted and authenticated with the secret.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::Response,
};
use cookie::{Cookie, Key};
use melware_caching::{CacheError, CacheStore, CacheStoreExt, Expiration};
use melware_config::domains::session::MIN_SECRET_LEN;
use melware_config::{SessionConfig, SessionStoreKind, Validatable};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::errors::{ConfigurationError, WebError};
use crate::utils::{build_cookie, get_cookie, seal, set_cookie_header, unseal, Seal};

pub use crate::utils::CookieOptions;

/// Default key for flash messages
pub const FLASH_KEY: &str = "_flash";

/// Values stored in a session
pub type SessionValues = HashMap<String, Value>;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store error: {0}")]
    Store(#[from] CacheError),

    #[error("Session value could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session payload is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// Backing storage for session values
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<SessionValues>, SessionError>;

    async fn save(&self, id: &str, values: &SessionValues, ttl: Duration) -> Result<(), SessionError>;

    async fn delete(&self, id: &str) -> Result<(), SessionError>;
}

/// [`SessionStore`] over any cache backend, storing values as JSON
pub struct CacheSessionStore {
    store: Arc<dyn CacheStore>,
    key_prefix: String,
    max_length: usize,
}

impl CacheSessionStore {
    pub fn new(store: Arc<dyn CacheStore>, key_prefix: impl Into<String>, max_length: usize) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
            max_length,
        }
    }

    pub fn from_config(store: Arc<dyn CacheStore>, config: &SessionConfig) -> Self {
        Self::new(store, config.key_prefix.clone(), config.max_length)
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.key_prefix, id)
    }
}

#[async_trait]
impl SessionStore for CacheSessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionValues>, SessionError> {
        Ok(self.store.get_json(&self.key(id)).await?)
    }

    async fn save(&self, id: &str, values: &SessionValues, ttl: Duration) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec(values)?;
        if self.max_length != 0 && bytes.len() > self.max_length {
            return Err(SessionError::TooLarge {
                size: bytes.len(),
                limit: self.max_length,
            });
        }
        self.store
            .set(&self.key(id), bytes, Expiration::After(ttl))
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), SessionError> {
        self.store.delete(&self.key(id)).await?;
        Ok(())
    }
}

impl From<&SessionConfig> for CookieOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            path: config.path.clone(),
            domain: config.domain.clone(),
            max_age: config.max_age,
            secure: config.secure,
            http_only: config.http_only,
        }
    }
}

#[derive(Debug, Clone)]
struct SessionState {
    id: Option<String>,
    values: SessionValues,
    options: CookieOptions,
    is_new: bool,
    changed: bool,
}

/// Handle to the current request's session.
///
/// Cheap to clone; all clones share state. Changes are persisted by
/// [`session_middleware`] after the handler returns.
#[derive(Debug, Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    fn new(id: Option<String>, values: SessionValues, options: CookieOptions, is_new: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                id,
                values,
                options,
                is_new,
                changed: false,
            })),
        }
    }

    fn fresh(options: CookieOptions) -> Self {
        Self::new(None, SessionValues::new(), options, true)
    }

    /// Session id; `None` until a new session is first saved, and always
    /// `None` for cookie-stored sessions
    pub fn id(&self) -> Option<String> {
        self.state.lock().id.clone()
    }

    /// True when the request carried no valid session
    pub fn is_new(&self) -> bool {
        self.state.lock().is_new
    }

    /// Raw JSON value for `key`
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.state.lock().values.get(key).cloned()
    }

    /// Typed value for `key`; `None` if missing or of another shape
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_value(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        let mut state = self.state.lock();
        state.values.insert(key.into(), value);
        state.changed = true;
        Ok(())
    }

    pub fn delete(&self, key: &str) {
        let mut state = self.state.lock();
        state.values.remove(key);
        state.changed = true;
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.values.clear();
        state.changed = true;
    }

    /// Queue a flash message under the default key
    pub fn add_flash<T: Serialize>(&self, value: T) -> Result<(), SessionError> {
        self.add_flash_to(FLASH_KEY, value)
    }

    pub fn add_flash_to<T: Serialize>(&self, key: &str, value: T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        let mut state = self.state.lock();
        match state.values.get_mut(key) {
            Some(Value::Array(flashes)) => flashes.push(value),
            _ => {
                state.values.insert(key.to_string(), Value::Array(vec![value]));
            }
        }
        state.changed = true;
        Ok(())
    }

    /// Take the flash messages under the default key
    pub fn flashes(&self) -> Vec<Value> {
        self.flashes_from(FLASH_KEY)
    }

    pub fn flashes_from(&self, key: &str) -> Vec<Value> {
        let mut state = self.state.lock();
        match state.values.remove(key) {
            Some(Value::Array(flashes)) => {
                state.changed = true;
                flashes
            }
            Some(other) => {
                state.changed = true;
                vec![other]
            }
            None => Vec::new(),
        }
    }

    pub fn options(&self) -> CookieOptions {
        self.state.lock().options.clone()
    }

    /// Replace the cookie options for this session; a negative `max_age`
    /// deletes the session when the response is written
    pub fn set_options(&self, options: CookieOptions) {
        let mut state = self.state.lock();
        state.options = options;
        state.changed = true;
    }

    fn take_if_changed(&self) -> Option<SessionState> {
        let mut state = self.state.lock();
        if !state.changed {
            return None;
        }
        state.changed = false;
        Some(state.clone())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| WebError::internal("session middleware is not installed"))
    }
}

enum Backend {
    Store(Arc<dyn SessionStore>),
    /// Values sealed into the cookie with this key
    Cookie(Key),
}

/// Shared state for [`session_middleware`]
pub struct SessionManager {
    config: SessionConfig,
    backend: Backend,
    /// Signs store-backed ids
    signing_key: Option<Key>,
}

impl SessionManager {
    /// Sessions kept in `store`; `config.store` is not consulted
    pub fn new(config: SessionConfig, store: Arc<dyn SessionStore>) -> Result<Self, ConfigurationError> {
        let signing_key = validated_key(&config)?;
        Ok(Self {
            config,
            backend: Backend::Store(store),
            signing_key,
        })
    }

    /// Sessions kept in `cache` under the configured key prefix
    pub fn with_cache(config: SessionConfig, cache: Arc<dyn CacheStore>) -> Result<Self, ConfigurationError> {
        let store = Arc::new(CacheSessionStore::from_config(cache, &config));
        Self::new(config, store)
    }

    /// Sessions kept entirely in an encrypted cookie; requires a secret
    pub fn cookie_store(config: SessionConfig) -> Result<Self, ConfigurationError> {
        let key = validated_key(&config)?
            .ok_or_else(|| ConfigurationError::Session("the cookie store requires a secret".to_string()))?;
        Ok(Self {
            config,
            backend: Backend::Cookie(key),
            signing_key: None,
        })
    }

    /// Pick the backend named by `config.store`
    pub fn from_config(config: SessionConfig, cache: Arc<dyn CacheStore>) -> Result<Self, ConfigurationError> {
        match config.store {
            SessionStoreKind::Cache => Self::with_cache(config, cache),
            SessionStoreKind::Cookie => Self::cookie_store(config),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn load(&self, cookie: Option<String>) -> Session {
        let options = CookieOptions::from(&self.config);
        let name = self.config.cookie_name.as_str();

        let Some(cookie) = cookie.filter(|value| !value.is_empty()) else {
            return Session::fresh(options);
        };

        let store = match &self.backend {
            Backend::Store(store) => store,
            Backend::Cookie(key) => {
                let values = unseal(name, &cookie, key, Seal::Private)
                    .and_then(|json| serde_json::from_str::<SessionValues>(&json).ok());
                return match values {
                    Some(values) => Session::new(None, values, options, false),
                    None => {
                        warn!("Session cookie could not be decrypted, starting a new session");
                        Session::fresh(options)
                    }
                };
            }
        };

        let id = match &self.signing_key {
            Some(key) => match unseal(name, &cookie, key, Seal::Signed) {
                Some(id) => id,
                None => {
                    warn!("Session id failed signature verification, starting a new session");
                    return Session::fresh(options);
                }
            },
            None => cookie,
        };

        match store.load(&id).await {
            Ok(Some(values)) => Session::new(Some(id), values, options, false),
            Ok(None) => {
                debug!("Session {} not found, starting a new one", id);
                Session::fresh(options)
            }
            Err(e) => {
                error!("Failed to load session: {}", e);
                Session::fresh(options)
            }
        }
    }

    async fn persist(&self, state: SessionState, response: &mut Response) {
        let cookie_name = self.config.cookie_name.as_str();

        if state.options.max_age < 0 {
            if let (Backend::Store(store), Some(id)) = (&self.backend, &state.id) {
                if let Err(e) = store.delete(id).await {
                    error!("Failed to delete session: {}", e);
                    return;
                }
            }
            set_cookie(response, &build_cookie(cookie_name, "", &state.options));
            return;
        }

        let cookie = match &self.backend {
            Backend::Store(store) => {
                let id = state
                    .id
                    .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
                let ttl = if state.options.max_age > 0 {
                    Duration::from_secs(state.options.max_age.unsigned_abs())
                } else {
                    self.config.default_ttl
                };

                if let Err(e) = store.save(&id, &state.values, ttl).await {
                    error!("Failed to save session: {}", e);
                    return;
                }

                let cookie = build_cookie(cookie_name, id, &state.options);
                match &self.signing_key {
                    Some(key) => seal(cookie, key, Seal::Signed),
                    None => Some(cookie),
                }
            }
            Backend::Cookie(key) => {
                let json = match serde_json::to_string(&state.values) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to save session: {}", SessionError::from(e));
                        return;
                    }
                };
                let sealed = seal(build_cookie(cookie_name, json, &state.options), key, Seal::Private);

                let limit = self.config.max_length;
                match sealed {
                    Some(cookie) if limit != 0 && cookie.value().len() > limit => {
                        let e = SessionError::TooLarge {
                            size: cookie.value().len(),
                            limit,
                        };
                        error!("Failed to save session: {}", e);
                        return;
                    }
                    sealed => sealed,
                }
            }
        };

        match cookie {
            Some(cookie) => set_cookie(response, &cookie),
            None => error!("Session cookie {} could not be sealed", cookie_name),
        }
    }
}

fn validated_key(config: &SessionConfig) -> Result<Option<Key>, ConfigurationError> {
    config
        .validate()
        .map_err(|e| ConfigurationError::Session(e.to_string()))?;

    match config.secret.as_deref() {
        Some(secret) if secret.len() >= MIN_SECRET_LEN => Ok(Some(Key::derive_from(secret.as_bytes()))),
        Some(_) => Err(ConfigurationError::Session(format!(
            "secret must be at least {} bytes",
            MIN_SECRET_LEN
        ))),
        None => Ok(None),
    }
}

fn set_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    match set_cookie_header(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!("Session cookie is not a valid header value: {}", e),
    }
}

/// Load the session before the handler and save it afterwards if it changed
pub async fn session_middleware(
    State(manager): State<Arc<SessionManager>>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie = get_cookie(request.headers(), &manager.config.cookie_name);
    let session = manager.load(cookie).await;
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if let Some(state) = session.take_if_changed() {
        manager.persist(state, &mut response).await;
    }

    response
}
