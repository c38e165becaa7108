//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field rules.
//! Every violation is reported, not just the first.

use std::net::SocketAddr;

use tracing::level_filters::LevelFilter;

use crate::config::schema::{StorageDriver, WorkerConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting all violations.
pub fn validate_config(config: &WorkerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::new("listener.max_body_size", "must be > 0"));
    }

    if config.logging.level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::new(
            "logging.level",
            format!("unknown level '{}'", config.logging.level),
        ));
    }

    if !config.database.url.starts_with("sqlite:") {
        errors.push(ValidationError::new(
            "database.url",
            "only sqlite: URLs are supported",
        ));
    }
    if config.database.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be > 0"));
    }

    if config.storage.driver == StorageDriver::Local && config.storage.root.trim().is_empty() {
        errors.push(ValidationError::new(
            "storage.root",
            "required for the local driver",
        ));
    }

    if config.queue.name.trim().is_empty() {
        errors.push(ValidationError::new("queue.name", "must not be empty"));
    }
    if config.queue.retry_base_delay_ms > config.queue.retry_max_delay_ms {
        errors.push(ValidationError::new(
            "queue.retry_base_delay_ms",
            "must not exceed queue.retry_max_delay_ms",
        ));
    }

    if config.queue.visibility_timeout_ms <= config.consumer.handler_timeout_ms {
        errors.push(ValidationError::new(
            "queue.visibility_timeout_ms",
            "must exceed consumer.handler_timeout_ms",
        ));
    }

    if config.consumer.batch_size == 0 {
        errors.push(ValidationError::new("consumer.batch_size", "must be > 0"));
    }
    if config.consumer.poll_interval_ms == 0 {
        errors.push(ValidationError::new("consumer.poll_interval_ms", "must be > 0"));
    }
    if config.consumer.handler_timeout_ms == 0 {
        errors.push(ValidationError::new("consumer.handler_timeout_ms", "must be > 0"));
    }

    if config.timeouts.call_ms == 0 {
        errors.push(ValidationError::new("timeouts.call_ms", "must be > 0"));
    }
    if config.timeouts.probe_ms == 0 {
        errors.push(ValidationError::new("timeouts.probe_ms", "must be > 0"));
    }
    if config.timeouts.probe_degraded_ms > config.timeouts.probe_ms {
        errors.push(ValidationError::new(
            "timeouts.probe_degraded_ms",
            "must not exceed timeouts.probe_ms",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&WorkerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_violation() {
        let mut config = WorkerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.logging.level = "loud".into();
        config.consumer.batch_size = 0;
        config.timeouts.probe_degraded_ms = config.timeouts.probe_ms + 1;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "logging.level",
                "consumer.batch_size",
                "timeouts.probe_degraded_ms",
            ]
        );
    }

    #[test]
    fn test_lease_must_outlive_handler() {
        let mut config = WorkerConfig::default();
        config.queue.visibility_timeout_ms = config.consumer.handler_timeout_ms;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "queue.visibility_timeout_ms");
    }

    #[test]
    fn test_rejects_non_sqlite_database() {
        let mut config = WorkerConfig::default();
        config.database.url = "postgres://localhost/forge".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "database.url");
    }
}
