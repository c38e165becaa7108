//! Per-request dependency wiring.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     WorkerConfig → lifecycle::startup → Bindings (raw backends, log level, timeouts)
//!
//! Per HTTP request (middleware.rs):
//!     Bindings → RequestContext::new → request extensions → handlers
//!
//! Per queue batch (consumer::worker):
//!     Bindings → RequestContext::new → QueueConsumer::process_batch
//! ```
//!
//! # Design Decisions
//! - A context is built fresh for every request or batch and never shared
//! - Contexts are immutable; adapters inside are cheap clones over `Arc`s
//! - The correlation id is a UUID v4 generated at entry, never taken from the caller

pub mod middleware;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::level_filters::LevelFilter;
use uuid::Uuid;

use crate::http::ApiError;
use crate::observability::RequestLogger;
use crate::services::{
    BlobBackend, CallTimeouts, DatabaseBackend, DatabaseService, QueueBackend, QueueService,
    StorageService,
};

pub use middleware::request_context_middleware;

/// Process-wide bindings every context is built from.
#[derive(Clone)]
pub struct Bindings {
    pub database: Arc<dyn DatabaseBackend>,
    pub storage: Arc<dyn BlobBackend>,
    pub queue: Arc<dyn QueueBackend>,
    pub log_level: LevelFilter,
    pub timeouts: CallTimeouts,
    pub version: String,
}

impl Bindings {
    pub fn new(
        database: Arc<dyn DatabaseBackend>,
        storage: Arc<dyn BlobBackend>,
        queue: Arc<dyn QueueBackend>,
    ) -> Self {
        Self {
            database,
            storage,
            queue,
            log_level: LevelFilter::INFO,
            timeouts: CallTimeouts::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_timeouts(mut self, timeouts: CallTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Everything a handler needs for one request.
#[derive(Clone)]
pub struct RequestContext {
    logger: RequestLogger,
    database: DatabaseService,
    storage: StorageService,
    queue: QueueService,
}

impl RequestContext {
    /// Build a context with a freshly generated correlation id.
    pub fn new(bindings: &Bindings) -> Self {
        Self::with_request_id(bindings, Uuid::new_v4().to_string())
    }

    pub fn with_request_id(bindings: &Bindings, request_id: impl Into<Arc<str>>) -> Self {
        let logger = RequestLogger::new(request_id, bindings.log_level);
        Self {
            database: DatabaseService::new(
                Arc::clone(&bindings.database),
                logger.clone(),
                bindings.timeouts,
            ),
            storage: StorageService::new(
                Arc::clone(&bindings.storage),
                logger.clone(),
                bindings.timeouts,
            ),
            queue: QueueService::new(
                Arc::clone(&bindings.queue),
                logger.clone(),
                bindings.timeouts,
            ),
            logger,
        }
    }

    pub fn request_id(&self) -> &str {
        self.logger.request_id()
    }

    pub fn logger(&self) -> &RequestLogger {
        &self.logger
    }

    pub fn db(&self) -> &DatabaseService {
        &self.database
    }

    pub fn storage(&self) -> &StorageService {
        &self.storage
    }

    pub fn queue(&self) -> &QueueService {
        &self.queue
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("request context middleware not installed".into()))
    }
}
