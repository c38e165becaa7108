//! `GET /health`.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use super::response::json_with_request_id;
use super::ApiError;
use crate::context::{Bindings, RequestContext};
use crate::health;
use crate::log_event;

pub async fn health_handler(
    State(bindings): State<Arc<Bindings>>,
    ctx: RequestContext,
) -> Result<Response, ApiError> {
    let report = health::check_all(&ctx, &bindings.version).await;
    render_report(&report, &ctx)
}

/// Serialize a health report; any failure becomes `HEALTH_CHECK_FAILED`.
fn render_report<T: Serialize>(report: &T, ctx: &RequestContext) -> Result<Response, ApiError> {
    json_with_request_id(report, ctx.request_id()).map_err(|e| {
        log_event!(ctx.logger(), ERROR, error = %e, "Health check failed");
        ApiError::HealthCheckFailed("Health check failed".into())
    })
}
