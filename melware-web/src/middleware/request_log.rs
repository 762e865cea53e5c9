//! One structured log event per request

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::USER_AGENT,
    middleware::Next,
    response::Response,
};
use chrono::format::{Item, StrftimeItems};
use chrono::{Local, Utc};
use melware_config::RequestLogConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::errors::ConfigurationError;

/// Shared state for [`request_log_middleware`]
#[derive(Debug, Clone)]
pub struct RequestLogger {
    utc: bool,
    time_format: String,
}

impl RequestLogger {
    /// Fails if `time_format` is not a valid strftime pattern
    pub fn new(config: &RequestLogConfig) -> Result<Self, ConfigurationError> {
        if StrftimeItems::new(&config.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigurationError::RequestLog(format!(
                "invalid time format {:?}",
                config.time_format
            )));
        }

        Ok(Self {
            utc: config.utc,
            time_format: config.time_format.clone(),
        })
    }

    fn now(&self) -> String {
        if self.utc {
            Utc::now().format(&self.time_format).to_string()
        } else {
            Local::now().format(&self.time_format).to_string()
        }
    }
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer
pub fn client_ip(request: &Request) -> String {
    let headers = request.headers();

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

/// Log status, method, path, ip, latency and user agent once the response is ready
pub async fn request_log_middleware(
    State(logger): State<Arc<RequestLogger>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let ip = client_ip(&request);
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();
    let time = logger.now();

    if response.status().is_server_error() {
        error!(status, %method, %path, %ip, ?latency, %user_agent, %time, "request failed");
    } else {
        info!(status, %method, %path, %ip, ?latency, %user_agent, %time, "request completed");
    }

    response
}
