//! # Melware Web
//!
//! Middleware add-ons for axum applications. Each middleware is a plain
//! `async fn` used with `axum::middleware::from_fn_with_state`, with its
//! validated configuration shared as `Arc` state.
//!
//! ## Features
//!
//! - **CORS**: origin list or predicate, precomputed preflight and response headers
//! - **JWT**: login, refresh and token verification over `jsonwebtoken`
//! - **Sessions**: signed cookie id with values in any `melware_caching::CacheStore`,
//!   or values encrypted into the cookie itself
//! - **Response cache**: replay of `GET` responses keyed by URI
//! - **Gzip**: `tower-http` compression at a configured level
//! - **Favicon** and **request logging**
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{middleware, routing::get, Router};
//! use melware_config::{CompressionLevel, CorsConfig};
//! use melware_web::middleware::{cors_middleware, gzip_layer, CorsPolicy};
//!
//! async fn hello() -> &'static str {
//!     "hello"
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = CorsPolicy::new(CorsConfig::with_origins(["https://example.com"]))?;
//!
//! let app: Router = Router::new()
//!     .route("/", get(hello))
//!     .layer(middleware::from_fn_with_state(Arc::new(policy), cors_middleware))
//!     .layer(gzip_layer(CompressionLevel::Default));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod middleware;
pub mod utils;

// Re-export commonly used types
pub use errors::{ConfigurationError, WebError, WebResult};
pub use middleware::{
    cors_middleware, favicon_middleware, gzip_layer, jwt_middleware, request_log_middleware, response_cache_middleware,
    session_middleware, CorsPolicy, Favicon, JwtAuth, RequestLogger, ResponseCache, Session, SessionManager,
};
