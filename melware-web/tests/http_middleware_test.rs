//! Gzip, favicon and request logging behavior through an axum router

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    middleware,
    routing::get,
    Router,
};
use melware_config::{CompressionLevel, RequestLogConfig};
use melware_web::middleware::{favicon_middleware, gzip_layer, request_log_middleware, Favicon, RequestLogger};
use tower::ServiceExt;

const ICON: &[u8] = b"\x00\x00\x01\x00\x01\x00\x10\x10icon-bytes";

async fn large_text() -> String {
    "melware ".repeat(512)
}

async fn page() -> &'static str {
    "page"
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

fn favicon_app() -> (Router, Favicon) {
    let favicon = Favicon::from_bytes(ICON, Duration::from_secs(3600));
    let router = Router::new()
        .route("/page", get(page))
        .layer(middleware::from_fn_with_state(Arc::new(favicon.clone()), favicon_middleware));
    (router, favicon)
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_gzip_honors_accept_encoding() {
    let app = Router::new()
        .route("/", get(large_text))
        .layer(gzip_layer(CompressionLevel::Best));

    let request = Request::builder()
        .uri("/")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    let compressed = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(compressed.len() < 4096);
    assert_eq!(&compressed[..2], &[0x1f, 0x8b]);

    let response = app.oneshot(request_plain("/")).await.unwrap();
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    let plain = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(plain.len(), 4096);
}

fn request_plain(uri: &str) -> Request<Body> {
    request(Method::GET, uri)
}

#[tokio::test]
async fn test_favicon_is_served() {
    let (app, favicon) = favicon_app();

    let response = app.oneshot(request(Method::GET, "/favicon.ico")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "image/x-icon");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
    assert_eq!(&headers[header::ETAG], favicon.etag());

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], ICON);
}

#[tokio::test]
async fn test_favicon_not_modified() {
    let (app, favicon) = favicon_app();

    let request = Request::builder()
        .uri("/favicon.ico")
        .header(header::IF_NONE_MATCH, favicon.etag().clone())
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=3600");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());

    let request = Request::builder()
        .uri("/favicon.ico")
        .header(header::IF_NONE_MATCH, "\"stale\"")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_favicon_methods() {
    let (app, _) = favicon_app();

    let response = app.clone().oneshot(request(Method::OPTIONS, "/favicon.ico")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ALLOW], "GET, HEAD, OPTIONS");

    let response = app.clone().oneshot(request(Method::POST, "/favicon.ico")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "GET, HEAD, OPTIONS");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");

    let response = app.oneshot(request(Method::HEAD, "/favicon.ico")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_other_paths_pass_favicon() {
    let (app, _) = favicon_app();

    let response = app.oneshot(request(Method::GET, "/page")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"page");
}

#[tokio::test]
async fn test_request_log_passes_responses_through() {
    let logger = Arc::new(RequestLogger::new(&RequestLogConfig::default()).unwrap());
    let app = Router::new()
        .route("/page", get(page))
        .route("/broken", get(broken))
        .layer(middleware::from_fn_with_state(logger, request_log_middleware));

    let request = Request::builder()
        .uri("/page")
        .header(header::USER_AGENT, "melware-test")
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"page");

    let response = app.clone().oneshot(request_plain("/broken")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = app.oneshot(request_plain("/nowhere")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
