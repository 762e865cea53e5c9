pub mod auth;
pub mod compression;
pub mod cors;
pub mod favicon;
pub mod request_log;
pub mod response_cache;
pub mod session;

// Re-export middleware functions and their state types
pub use auth::{
    jwt_middleware, login_handler, refresh_handler, Authenticator, Credentials, JwtAuth, JwtClaims, TokenResponse,
    UserId,
};
pub use compression::{compression_level, gzip_layer, gzip_layer_from_config};
pub use cors::{
    canonical_header_name, cors_middleware, normalize_strs, validate_allow_origins, CorsPolicy, OriginPredicate,
};
pub use favicon::{favicon_middleware, Favicon, FAVICON_PATH};
pub use request_log::{client_ip, request_log_middleware, RequestLogger};
pub use response_cache::{response_cache_middleware, CachedResponse, ResponseCache};
pub use session::{
    session_middleware, CacheSessionStore, CookieOptions, Session, SessionError, SessionManager, SessionStore,
    SessionValues, FLASH_KEY,
};
