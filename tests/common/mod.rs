//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use forge_worker::context::Bindings;
use forge_worker::services::{
    BlobBackend, BlobObject, CallTimeouts, DatabaseBackend, MemoryBlobBackend, MemoryQueueBackend,
    QueueBackend, Row, ServiceError, SqliteBackend,
};

/// Timeouts short enough to keep hung-probe tests fast.
pub fn test_timeouts() -> CallTimeouts {
    CallTimeouts {
        call: Duration::from_millis(1000),
        probe: Duration::from_millis(500),
        degraded_after: Duration::from_millis(100),
    }
}

pub async fn sqlite_backend() -> SqliteBackend {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    SqliteBackend::from_pool(pool)
}

/// In-memory bindings with every backend healthy.
pub async fn memory_bindings() -> Bindings {
    bindings_with(
        Arc::new(sqlite_backend().await),
        Arc::new(MemoryBlobBackend::new()),
        Arc::new(MemoryQueueBackend::new("test-queue", 3)),
    )
}

pub fn bindings_with(
    database: Arc<dyn DatabaseBackend>,
    storage: Arc<dyn BlobBackend>,
    queue: Arc<dyn QueueBackend>,
) -> Bindings {
    Bindings::new(database, storage, queue)
        .with_log_level(LevelFilter::DEBUG)
        .with_timeouts(test_timeouts())
        .with_version("test-1.0.0")
}

/// How a fake backend's probe behaves.
#[derive(Clone, Copy)]
pub enum Probe {
    Fail,
    Slow(Duration),
    Hang,
    Panic,
}

impl Probe {
    async fn run(self, service: &'static str) -> Result<(), ServiceError> {
        match self {
            Probe::Fail => Err(ServiceError::backend(service, "connection refused")),
            Probe::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Probe::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            Probe::Panic => panic!("{service} probe panicked"),
        }
    }
}

/// Blob backend whose probe misbehaves; object operations always fail.
pub struct FaultyBlobBackend(pub Probe);

#[async_trait]
impl BlobBackend for FaultyBlobBackend {
    fn backend_tag(&self) -> &'static str {
        "faulty"
    }

    async fn upload(&self, _: String, _: Vec<u8>, _: HashMap<String, String>) -> Result<(), ServiceError> {
        Err(ServiceError::backend("storage", "bucket unavailable"))
    }

    async fn download(&self, _: String) -> Result<Option<BlobObject>, ServiceError> {
        Err(ServiceError::backend("storage", "bucket unavailable"))
    }

    async fn delete(&self, _: String) -> Result<(), ServiceError> {
        Err(ServiceError::backend("storage", "bucket unavailable"))
    }

    async fn list(&self, _: String) -> Result<Vec<String>, ServiceError> {
        Err(ServiceError::backend("storage", "bucket unavailable"))
    }

    async fn probe(&self) -> Result<(), ServiceError> {
        self.0.run("storage").await
    }
}

/// Database backend whose probe misbehaves and whose statements always fail.
pub struct FaultyDatabase(pub Probe);

#[async_trait]
impl DatabaseBackend for FaultyDatabase {
    fn backend_tag(&self) -> &'static str {
        "faulty"
    }

    async fn query(&self, _: String, _: Vec<Value>) -> Result<Vec<Row>, ServiceError> {
        Err(ServiceError::backend("database", "no such table: projects"))
    }

    async fn query_one(&self, _: String, _: Vec<Value>) -> Result<Option<Row>, ServiceError> {
        Err(ServiceError::backend("database", "no such table: projects"))
    }

    async fn execute(&self, _: String, _: Vec<Value>) -> Result<(), ServiceError> {
        Err(ServiceError::backend("database", "no such table: projects"))
    }

    async fn probe(&self) -> Result<(), ServiceError> {
        self.0.run("database").await
    }
}

/// Database backend whose writes take `delay` and then record completion.
pub struct SlowWriteDatabase {
    pub delay: Duration,
    pub completed: Arc<AtomicBool>,
}

#[async_trait]
impl DatabaseBackend for SlowWriteDatabase {
    fn backend_tag(&self) -> &'static str {
        "slow"
    }

    async fn query(&self, _: String, _: Vec<Value>) -> Result<Vec<Row>, ServiceError> {
        Ok(Vec::new())
    }

    async fn query_one(&self, _: String, _: Vec<Value>) -> Result<Option<Row>, ServiceError> {
        Ok(None)
    }

    async fn execute(&self, _: String, _: Vec<Value>) -> Result<(), ServiceError> {
        tokio::time::sleep(self.delay).await;
        self.completed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn probe(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// In-memory JSON log sink.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Install a JSON subscriber for the current thread.
    pub fn install() -> (Self, DefaultGuard) {
        Self::install_with_spans(false)
    }

    /// Like [`install`](Self::install); with `spans`, each line also carries
    /// its enclosing span's fields under `span`.
    pub fn install_with_spans(spans: bool) -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_current_span(spans)
            .with_span_list(false)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(capture.clone())
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn lines(&self) -> Vec<Value> {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    pub fn with_message(&self, message: &str) -> Vec<Value> {
        self.lines()
            .into_iter()
            .filter(|line| line["message"] == message)
            .collect()
    }
}

pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter(Arc::clone(&self.buffer))
    }
}

/// Send a request through the router and decode the JSON body.
pub async fn send(router: Router, request: Request<Body>) -> (Response<()>, Value) {
    let response = router.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (Response::from_parts(parts, ()), json)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
