//! Web-specific error types and conversions
//!
//! [`WebError`] is what handlers and extractors return at request time.
//! [`ConfigurationError`] is returned once, when a middleware is built from
//! invalid settings.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Web-specific error type for HTTP operations
#[derive(Debug, Error)]
pub enum WebError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

impl WebError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            WebError::Forbidden { .. } => StatusCode::FORBIDDEN,
            WebError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The client-facing message, without the category prefix
    pub fn message(&self) -> &str {
        match self {
            WebError::Unauthorized { message }
            | WebError::Forbidden { message }
            | WebError::Internal { message } => message,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the logs
        let message = match &self {
            WebError::Internal { message } => {
                tracing::error!("Internal error: {}", message);
                "Internal server error".to_string()
            }
            _ => self.message().to_string(),
        };

        let body = json!({
            "code": status.as_u16(),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

// Common error constructors
impl WebError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        WebError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        WebError::Forbidden {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        WebError::Internal {
            message: message.into(),
        }
    }
}

/// Invalid middleware settings, reported when the middleware is constructed
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid CORS configuration: {0}")]
    Cors(String),

    #[error("Invalid JWT configuration: {0}")]
    Jwt(String),

    #[error("Invalid session configuration: {0}")]
    Session(String),

    #[error("Invalid request log configuration: {0}")]
    RequestLog(String),

    #[error("Failed to read favicon {path}: {source}")]
    Favicon {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Value for header {name} is not a valid header value: {value:?}")]
    InvalidHeaderValue { name: String, value: String },

    #[error(transparent)]
    Config(#[from] melware_config::ConfigError),
}
