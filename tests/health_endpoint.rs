//! `GET /health` through the full router.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get as get_route;
use axum::Router;
use serde_json::{json, Value};

use common::{
    bindings_with, get, memory_bindings, send, sqlite_backend, FaultyBlobBackend, FaultyDatabase,
    Probe,
};
use forge_worker::config::ListenerConfig;
use forge_worker::http::{build_router, with_middleware, X_REQUEST_ID};
use forge_worker::services::{MemoryBlobBackend, MemoryQueueBackend};
use forge_worker::Bindings;

fn router(bindings: Bindings) -> Router {
    build_router(&ListenerConfig::default(), Arc::new(bindings))
}

fn without_volatile(mut body: Value) -> Value {
    let map = body.as_object_mut().unwrap();
    map.remove("timestamp");
    map.remove("request_id");
    body
}

#[tokio::test]
async fn test_all_services_healthy() {
    let (response, body) = send(router(memory_bindings().await), get("/health")).await;

    assert_eq!(response.status(), 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], "test-1.0.0");
    assert_eq!(
        body["services"],
        json!({"database": "healthy", "storage": "healthy", "queue": "healthy"})
    );
    assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_storage_failure_is_isolated() {
    let bindings = bindings_with(
        Arc::new(sqlite_backend().await),
        Arc::new(FaultyBlobBackend(Probe::Fail)),
        Arc::new(MemoryQueueBackend::new("q", 3)),
    );
    let (response, body) = send(router(bindings), get("/health")).await;

    assert_eq!(response.status(), 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(
        body["services"],
        json!({"database": "healthy", "storage": "unhealthy", "queue": "healthy"})
    );
}

#[tokio::test]
async fn test_request_id_in_body_matches_header() {
    let (response, body) = send(router(memory_bindings().await), get("/health")).await;

    let header = response.headers()[X_REQUEST_ID].to_str().unwrap();
    assert_eq!(body["request_id"], header);
    assert_eq!(uuid::Uuid::parse_str(header).unwrap().get_version_num(), 4);
}

#[tokio::test]
async fn test_consecutive_checks_identical_modulo_timestamp() {
    let app = router(memory_bindings().await);

    let (_, first) = send(app.clone(), get("/health")).await;
    let (_, second) = send(app, get("/health")).await;

    assert_ne!(first["request_id"], second["request_id"]);
    assert_eq!(without_volatile(first), without_volatile(second));
}

#[tokio::test]
async fn test_hung_probe_does_not_block_others() {
    let bindings = bindings_with(
        Arc::new(FaultyDatabase(Probe::Hang)),
        Arc::new(MemoryBlobBackend::new()),
        Arc::new(MemoryQueueBackend::new("q", 3)),
    );

    let started = Instant::now();
    let (response, body) = send(router(bindings), get("/health")).await;

    // Bounded by the probe deadline, not by the hung backend.
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(response.status(), 200);
    assert_eq!(
        body["services"],
        json!({"database": "unhealthy", "storage": "healthy", "queue": "healthy"})
    );
}

#[tokio::test]
async fn test_slow_probe_reported_degraded() {
    let bindings = bindings_with(
        Arc::new(sqlite_backend().await),
        Arc::new(FaultyBlobBackend(Probe::Slow(Duration::from_millis(250)))),
        Arc::new(MemoryQueueBackend::new("q", 3)),
    );
    let (_, body) = send(router(bindings), get("/health")).await;

    assert_eq!(body["services"]["storage"], "degraded");
}

#[tokio::test]
async fn test_panicking_probe_reported_unhealthy() {
    let bindings = bindings_with(
        Arc::new(FaultyDatabase(Probe::Panic)),
        Arc::new(FaultyBlobBackend(Probe::Panic)),
        Arc::new(MemoryQueueBackend::new("q", 3)),
    );
    let (response, body) = send(router(bindings), get("/health")).await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        body["services"],
        json!({"database": "unhealthy", "storage": "unhealthy", "queue": "healthy"})
    );
}

#[tokio::test]
async fn test_unknown_route_not_found() {
    let (response, body) = send(router(memory_bindings().await), get("/projects/42")).await;

    assert_eq!(response.status(), 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["request_id"], response.headers()[X_REQUEST_ID].to_str().unwrap());
}

#[tokio::test]
async fn test_wrong_method_on_known_route_not_found() {
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let (response, body) = send(router(memory_bindings().await), request).await;

    assert_eq!(response.status(), 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["request_id"], response.headers()[X_REQUEST_ID].to_str().unwrap());
}

#[tokio::test]
async fn test_handler_panic_renders_internal_error() {
    let bindings = Arc::new(memory_bindings().await);
    let routes = Router::new().route(
        "/explode",
        get_route(|| async {
            let detail = "secret connection string";
            if !detail.is_empty() {
                panic!("{detail}");
            }
        }),
    );
    let app = with_middleware(routes, &ListenerConfig::default(), bindings);

    let (response, body) = send(app, get("/explode")).await;

    assert_eq!(response.status(), 500);
    assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
    assert!(!body.to_string().contains("secret connection string"));
    assert_eq!(body["request_id"], response.headers()[X_REQUEST_ID].to_str().unwrap());
}
