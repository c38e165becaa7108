//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the process-wide subscriber (JSON or pretty)
//! - Provide a per-request logger bound to a correlation id
//! - Apply the configured minimum severity per request
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON lines are flattened so `request_id` is a top-level key
//! - Request loggers are cheap to clone and never shared across requests

use std::sync::Arc;

use tracing::level_filters::LevelFilter;
use tracing::{Level, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("forge_worker={level},tower_http={level}", level = config.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

/// Logger bound to one request (or one queue batch).
///
/// Every event emitted through [`log_event!`](crate::log_event) carries the
/// correlation id as `request_id` and is parented to the request span.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    request_id: Arc<str>,
    max_level: LevelFilter,
    span: Span,
}

impl RequestLogger {
    pub fn new(request_id: impl Into<Arc<str>>, max_level: LevelFilter) -> Self {
        let request_id = request_id.into();
        let span = tracing::info_span!("request", request_id = %request_id);
        Self {
            request_id,
            max_level,
            span,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    /// Whether an event at `level` passes this logger's minimum severity.
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }
}

/// Emit an event through a [`RequestLogger`].
///
/// ```ignore
/// log_event!(ctx.logger(), DEBUG, sql = %statement, "Executing database query");
/// ```
#[macro_export]
macro_rules! log_event {
    ($logger:expr, $level:ident, $($arg:tt)+) => {{
        let logger: &$crate::observability::logging::RequestLogger = &$logger;
        if logger.enabled(::tracing::Level::$level) {
            ::tracing::event!(
                parent: logger.span(),
                ::tracing::Level::$level,
                request_id = %logger.request_id(),
                $($arg)+
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_gate() {
        let logger = RequestLogger::new("req-1", LevelFilter::INFO);
        assert!(logger.enabled(Level::ERROR));
        assert!(logger.enabled(Level::INFO));
        assert!(!logger.enabled(Level::DEBUG));
        assert_eq!(logger.request_id(), "req-1");
    }

    #[test]
    fn test_off_disables_everything() {
        let logger = RequestLogger::new("req-2", LevelFilter::OFF);
        assert!(!logger.enabled(Level::ERROR));
    }
}
