//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated configuration into concrete backends
//! - Bind the HTTP listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Backends initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;

use crate::config::{ConfigError, StorageDriver, WorkerConfig};
use crate::context::Bindings;
use crate::services::{
    BlobBackend, CallTimeouts, LocalFsBlobBackend, MemoryBlobBackend, MemoryQueueBackend,
    ServiceError, SqliteBackend,
};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to initialize logging: {0}")]
    Logging(String),

    #[error("invalid log level '{0}'")]
    LogLevel(String),

    #[error("database unavailable: {0}")]
    Database(ServiceError),

    #[error("blob storage unavailable: {0}")]
    Storage(ServiceError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Build the process-wide bindings from configuration.
pub async fn build_bindings(config: &WorkerConfig) -> Result<Bindings, StartupError> {
    let log_level: LevelFilter = config
        .logging
        .level
        .parse()
        .map_err(|_| StartupError::LogLevel(config.logging.level.clone()))?;

    let database = SqliteBackend::connect(&config.database)
        .await
        .map_err(StartupError::Database)?;

    let storage: Arc<dyn BlobBackend> = match config.storage.driver {
        StorageDriver::Local => Arc::new(
            LocalFsBlobBackend::open(&config.storage.root)
                .await
                .map_err(StartupError::Storage)?,
        ),
        StorageDriver::Memory => Arc::new(MemoryBlobBackend::new()),
    };

    let queue = MemoryQueueBackend::from_config(&config.queue);
    tracing::info!(
        queue = %config.queue.name,
        max_retries = config.queue.max_retries,
        visibility_timeout_ms = config.queue.visibility_timeout_ms,
        "Queue ready"
    );

    Ok(Bindings::new(Arc::new(database), storage, Arc::new(queue))
        .with_log_level(log_level)
        .with_timeouts(CallTimeouts::from(&config.timeouts))
        .with_version(config.service.version.clone()))
}

pub async fn bind_listener(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_bindings_in_memory() {
        let mut config = WorkerConfig::default();
        config.database.url = "sqlite::memory:".into();
        config.database.max_connections = 1;
        config.storage.driver = StorageDriver::Memory;
        config.logging.level = "warn".into();
        config.service.version = "9.9.9".into();

        let bindings = build_bindings(&config).await.unwrap();
        assert_eq!(bindings.log_level, LevelFilter::WARN);
        assert_eq!(bindings.version, "9.9.9");
        assert_eq!(bindings.queue.queue_name(), "task-queue");
        assert_eq!(bindings.storage.backend_tag(), "memory");
    }

    #[tokio::test]
    async fn test_bad_log_level_rejected() {
        let mut config = WorkerConfig::default();
        config.logging.level = "loud".into();
        assert!(matches!(
            build_bindings(&config).await,
            Err(StartupError::LogLevel(level)) if level == "loud"
        ));
    }
}
