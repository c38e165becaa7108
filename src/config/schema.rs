//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the worker.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the worker.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WorkerConfig {
    /// Service identity reported by the health endpoint.
    pub service: ServiceConfig,

    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Database backend settings.
    pub database: DatabaseConfig,

    /// Blob storage backend settings.
    pub storage: StorageConfig,

    /// Queue backend settings.
    pub queue: QueueConfig,

    /// Queue consumer settings.
    pub consumer: ConsumerConfig,

    /// Deadlines for backend calls and health probes.
    pub timeouts: TimeoutConfig,

    /// Metrics settings.
    pub observability: ObservabilityConfig,
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Version tag reported in health reports.
    pub version: String,

    /// Deployment environment name (e.g., "development", "production").
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8787").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8787".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum severity (trace, debug, info, warn, error).
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Database backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL (e.g., "sqlite://forge.db" or "sqlite::memory:").
    pub url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://forge.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Blob storage driver.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    /// Objects on the local filesystem under `root`.
    Local,
    /// Process-local map; contents are lost on restart.
    Memory,
}

/// Blob storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub driver: StorageDriver,

    /// Root directory for the local driver.
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: StorageDriver::Local,
            root: "./data/blobs".to_string(),
        }
    }
}

/// Queue backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue name used in logs and metrics.
    pub name: String,

    /// Redeliveries allowed before a message is dead-lettered.
    pub max_retries: u32,

    /// Base delay for exponential redelivery backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum redelivery delay in milliseconds.
    pub retry_max_delay_ms: u64,

    /// How long a received message stays hidden before it is redelivered
    /// unsettled, in milliseconds.
    pub visibility_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "task-queue".to_string(),
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 60_000,
            visibility_timeout_ms: 60_000,
        }
    }
}

/// Queue consumer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Run the consumer loop alongside the HTTP server.
    pub enabled: bool,

    /// Maximum messages per delivered batch.
    pub batch_size: usize,

    /// How long a receive waits for the first message, in milliseconds.
    pub poll_interval_ms: u64,

    /// Deadline for a single message handler in milliseconds.
    pub handler_timeout_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 10,
            poll_interval_ms: 1000,
            handler_timeout_ms: 30_000,
        }
    }
}

/// Timeout configuration for backend operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a single backend call in milliseconds.
    pub call_ms: u64,

    /// Deadline for a health probe in milliseconds.
    pub probe_ms: u64,

    /// Probes slower than this report `degraded`, in milliseconds.
    pub probe_degraded_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_ms: 10_000,
            probe_ms: 2_000,
            probe_degraded_ms: 1_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
