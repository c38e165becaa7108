//! Project-lifecycle worker: request-context wiring, aggregated health, and a
//! queue-driven work dispatcher over database, blob storage, and queue backends.

pub mod config;
pub mod consumer;
pub mod context;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod services;

pub use config::WorkerConfig;
pub use context::{Bindings, RequestContext};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
