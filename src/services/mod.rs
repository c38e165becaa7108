//! Service adapters over the three managed backends.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     config → concrete backends (sqlite, local_fs / memory_blob, memory_queue)
//!     → Arc<dyn *Backend> stored in Bindings
//!
//! Per request:
//!     Bindings + RequestLogger → DatabaseService / StorageService / QueueService
//!     → every call: debug log → detached backend call with deadline → error log on failure
//! ```
//!
//! # Design Decisions
//! - Backends are selected at construction time and injected, never global
//! - Adapters log failures once and return them unchanged; they never retry
//! - Health probes are the only place failures are absorbed (mapped to `unhealthy`)

pub mod database;
pub mod local_fs;
pub mod memory_blob;
pub mod memory_queue;
pub mod queue;
pub mod sqlite;
pub mod storage;

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::TimeoutConfig;
use crate::log_event;
use crate::observability::RequestLogger;
use crate::resilience::run_detached;

pub use database::{DatabaseBackend, DatabaseService, Row};
pub use local_fs::LocalFsBlobBackend;
pub use memory_blob::MemoryBlobBackend;
pub use memory_queue::MemoryQueueBackend;
pub use queue::{
    MessageId, MessageType, QueueBackend, QueueMessage, QueueService, ReceivedMessage,
};
pub use sqlite::SqliteBackend;
pub use storage::{BlobBackend, BlobObject, StorageService};

/// Liveness of a single backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceHealth::Healthy => "healthy",
            ServiceHealth::Degraded => "degraded",
            ServiceHealth::Unhealthy => "unhealthy",
        })
    }
}

/// Failure of a backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{service} backend error: {message}")]
    Backend {
        service: &'static str,
        message: String,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation} aborted: {reason}")]
    Aborted {
        operation: &'static str,
        reason: String,
    },

    #[error("invalid blob key '{0}'")]
    InvalidKey(String),

    #[error("message serialization failed: {0}")]
    Serialization(String),

    #[error("unknown message id {0}")]
    UnknownMessage(MessageId),
}

impl ServiceError {
    pub fn backend(service: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Backend {
            service,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Serialization(e.to_string())
    }
}

/// Deadlines applied by every adapter.
#[derive(Debug, Clone, Copy)]
pub struct CallTimeouts {
    pub call: Duration,
    pub probe: Duration,
    pub degraded_after: Duration,
}

impl From<&TimeoutConfig> for CallTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            call: Duration::from_millis(config.call_ms),
            probe: Duration::from_millis(config.probe_ms),
            degraded_after: Duration::from_millis(config.probe_degraded_ms),
        }
    }
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

/// Run a liveness probe and map its outcome to a [`ServiceHealth`].
///
/// Never returns an error: failures and timeouts become `Unhealthy`.
pub(crate) async fn probe_health<F>(
    service: &'static str,
    logger: &RequestLogger,
    timeouts: CallTimeouts,
    probe: F,
) -> ServiceHealth
where
    F: Future<Output = Result<(), ServiceError>> + Send + 'static,
{
    let started = Instant::now();
    match run_detached("health_check", timeouts.probe, probe).await {
        Ok(()) => {
            let elapsed = started.elapsed();
            if elapsed >= timeouts.degraded_after {
                log_event!(
                    logger,
                    WARN,
                    service,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Health check slow"
                );
                ServiceHealth::Degraded
            } else {
                ServiceHealth::Healthy
            }
        }
        Err(e) => {
            log_event!(logger, ERROR, service, error = %e, "Health check failed");
            ServiceHealth::Unhealthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    fn logger() -> RequestLogger {
        RequestLogger::new("probe-test", LevelFilter::OFF)
    }

    #[tokio::test]
    async fn test_probe_outcomes() {
        let timeouts = CallTimeouts {
            call: Duration::from_secs(1),
            probe: Duration::from_millis(200),
            degraded_after: Duration::from_millis(50),
        };

        let ok = probe_health("database", &logger(), timeouts, async { Ok(()) }).await;
        assert_eq!(ok, ServiceHealth::Healthy);

        let failed = probe_health("database", &logger(), timeouts, async {
            Err(ServiceError::backend("database", "disk I/O error"))
        })
        .await;
        assert_eq!(failed, ServiceHealth::Unhealthy);

        let slow = probe_health("storage", &logger(), timeouts, async {
            tokio::time::sleep(Duration::from_millis(80)).await;
            Ok(())
        })
        .await;
        assert_eq!(slow, ServiceHealth::Degraded);

        let hung = probe_health("queue", &logger(), timeouts, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(hung, ServiceHealth::Unhealthy);
    }

    #[test]
    fn test_health_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ServiceHealth::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
        assert_eq!(ServiceHealth::Degraded.to_string(), "degraded");
    }
}
