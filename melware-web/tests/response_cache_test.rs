use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, Method, Request, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use melware_caching::{CacheStore, InMemoryStore};
use melware_web::middleware::{response_cache_middleware, ResponseCache};
use tower::ServiceExt;

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

impl Hits {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

async fn counted(State(hits): State<Hits>) -> impl IntoResponse {
    let n = hits.0.fetch_add(1, Ordering::SeqCst) + 1;
    ([(header::CONTENT_TYPE, "text/plain")], format!("hit {}", n))
}

async fn missing(State(hits): State<Hits>) -> impl IntoResponse {
    hits.0.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, "nope")
}

fn app(cache: ResponseCache, hits: Hits) -> Router {
    Router::new()
        .route("/counted", get(counted).post(counted))
        .route("/missing", get(missing))
        .layer(middleware::from_fn_with_state(Arc::new(cache), response_cache_middleware))
        .with_state(hits)
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

async fn text(response: axum::response::Response) -> String {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

fn in_memory() -> Arc<dyn CacheStore> {
    Arc::new(InMemoryStore::new(None))
}

#[tokio::test]
async fn test_second_get_is_served_from_cache() {
    let hits = Hits::default();
    let app = app(ResponseCache::new(in_memory(), "melware_cache"), hits.clone());

    let first = app.clone().oneshot(request(Method::GET, "/counted")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(text(first).await, "hit 1");

    let second = app.clone().oneshot(request(Method::GET, "/counted")).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(text(second).await, "hit 1");
    assert_eq!(hits.count(), 1);

    // HEAD reads the cached entry too
    let head = app.clone().oneshot(request(Method::HEAD, "/counted")).await.unwrap();
    assert_eq!(head.status(), StatusCode::OK);
    assert_eq!(hits.count(), 1);

    // The query string is part of the key
    let other = app.oneshot(request(Method::GET, "/counted?page=2")).await.unwrap();
    assert_eq!(text(other).await, "hit 2");
}

#[tokio::test]
async fn test_post_bypasses_cache() {
    let hits = Hits::default();
    let app = app(ResponseCache::new(in_memory(), "melware_cache"), hits.clone());

    for expected in ["hit 1", "hit 2"] {
        let response = app.clone().oneshot(request(Method::POST, "/counted")).await.unwrap();
        assert_eq!(text(response).await, expected);
    }

    let response = app.oneshot(request(Method::GET, "/counted")).await.unwrap();
    assert_eq!(text(response).await, "hit 3");
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let hits = Hits::default();
    let app = app(ResponseCache::new(in_memory(), "melware_cache"), hits.clone());

    for _ in 0..2 {
        let response = app.clone().oneshot(request(Method::GET, "/missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
    assert_eq!(hits.count(), 2);
}

#[tokio::test]
async fn test_oversized_body_is_not_cached() {
    let hits = Hits::default();
    let cache = ResponseCache::new(in_memory(), "melware_cache").with_max_body_bytes(3);
    let app = app(cache, hits.clone());

    for expected in ["hit 1", "hit 2"] {
        let response = app.clone().oneshot(request(Method::GET, "/counted")).await.unwrap();
        assert_eq!(text(response).await, expected);
    }
}

#[tokio::test]
async fn test_cached_entry_expires() {
    let hits = Hits::default();
    let cache = ResponseCache::new(in_memory(), "melware_cache").with_ttl(Duration::from_millis(50));
    let app = app(cache, hits.clone());

    let response = app.clone().oneshot(request(Method::GET, "/counted")).await.unwrap();
    assert_eq!(text(response).await, "hit 1");

    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = app.oneshot(request(Method::GET, "/counted")).await.unwrap();
    assert_eq!(text(response).await, "hit 2");
}
