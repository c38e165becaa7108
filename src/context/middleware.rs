//! Request-context middleware.
//!
//! Wraps every request: builds the [`RequestContext`], logs start and
//! completion through the request logger, renders any downstream
//! [`ApiError`] into the uniform body, and sets `X-Request-ID`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use super::{Bindings, RequestContext};
use crate::http::request::user_agent;
use crate::http::response::{error_response, set_request_id_header};
use crate::http::ApiError;
use crate::log_event;
use crate::observability::metrics;

pub async fn request_context_middleware(
    State(bindings): State<Arc<Bindings>>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let ctx = RequestContext::new(&bindings);
    let method = request.method().clone();

    log_event!(
        ctx.logger(),
        INFO,
        method = %method,
        url = %request.uri(),
        user_agent = user_agent(request.headers()),
        "Request started"
    );

    request.extensions_mut().insert(ctx.clone());
    let span = ctx.logger().span().clone();
    let response = next.run(request).instrument(span).await;

    let mut response = match response.extensions().get::<ApiError>() {
        Some(error) => {
            if let ApiError::Internal(detail) = error {
                log_event!(ctx.logger(), ERROR, error = %detail, "Unhandled error");
            } else {
                log_event!(
                    ctx.logger(),
                    WARN,
                    code = error.code(),
                    error = %error,
                    "Request failed"
                );
            }
            error_response(error, ctx.request_id())
        }
        None => response,
    };
    set_request_id_header(&mut response, ctx.request_id());

    let status = response.status().as_u16();
    log_event!(
        ctx.logger(),
        INFO,
        status,
        duration_ms = started.elapsed().as_millis() as u64,
        "Request completed"
    );
    metrics::record_request(method.as_str(), status, started);

    response
}
