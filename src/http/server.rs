//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request context, body limit, panic capture)
//! - Serve on a bound listener until shutdown is broadcast

use std::any::Any;
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;

use super::health::health_handler;
use super::ApiError;
use crate::config::ListenerConfig;
use crate::context::{request_context_middleware, Bindings};

/// HTTP front of the worker.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ListenerConfig, bindings: Arc<Bindings>) -> Self {
        Self {
            router: build_router(config, bindings),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until a shutdown signal arrives, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// The worker's full router.
pub fn build_router(config: &ListenerConfig, bindings: Arc<Bindings>) -> Router {
    with_middleware(
        Router::new().route("/health", get(health_handler)),
        config,
        bindings,
    )
}

/// Wrap `routes` with the 404 fallbacks and the standard layer stack.
///
/// Unknown paths and known paths with an unsupported method both answer
/// `NOT_FOUND` through the uniform error body.
///
/// Layers listed first run outermost, so the context middleware sees every
/// response, including caught panics.
pub fn with_middleware(
    routes: Router<Arc<Bindings>>,
    config: &ListenerConfig,
    bindings: Arc<Bindings>,
) -> Router {
    routes
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(Arc::clone(&bindings), request_context_middleware))
                .layer(RequestBodyLimitLayer::new(config.max_body_size))
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        .with_state(bindings)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route")
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::Internal(format!("panic: {detail}")).into_response()
}
