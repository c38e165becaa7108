//! Request-side constants and helpers.

use axum::http::{header::USER_AGENT, HeaderMap};

/// Correlation id response header.
pub const X_REQUEST_ID: &str = "x-request-id";

/// User agent of the caller, or empty when absent or not valid UTF-8.
pub fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
