//! Response bodies.
//!
//! # Responsibilities
//! - Render the uniform error body `{error:{code,message,issues?}, request_id}`
//! - Stamp `request_id` into successful JSON bodies
//! - Attach the `X-Request-ID` header
//!
//! # Design Decisions
//! - Rendering happens once, in the request-context middleware
//! - Internal error detail never reaches the body

use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use super::error::{ApiError, ValidationIssue};
use super::request::X_REQUEST_ID;

#[derive(Debug, Serialize)]
pub struct ErrorDetail<'a> {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<&'a [ValidationIssue]>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: ErrorDetail<'a>,
    pub request_id: &'a str,
}

/// Full error response for `error` within request `request_id`.
pub fn error_response(error: &ApiError, request_id: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: error.code(),
            message: error.public_message(),
            issues: error.issues(),
        },
        request_id,
    };
    let mut response = (error.status(), Json(body)).into_response();
    set_request_id_header(&mut response, request_id);
    response
}

/// JSON success body with `request_id` merged into the top-level object.
pub fn json_with_request_id<T: Serialize>(payload: &T, request_id: &str) -> Result<Response, ApiError> {
    let value = match serde_json::to_value(payload).map_err(|e| ApiError::Internal(e.to_string()))? {
        Value::Object(mut map) => {
            map.insert("request_id".into(), Value::String(request_id.to_owned()));
            Value::Object(map)
        }
        other => serde_json::json!({ "data": other, "request_id": request_id }),
    };
    Ok(Json(value).into_response())
}

pub fn set_request_id_header(response: &mut Response, request_id: &str) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_error_body_shape() {
        let error = ApiError::Validation {
            message: "Invalid project".into(),
            issues: vec![ValidationIssue::new("name", "required")],
        };
        let response = error_response(&error, "req-42");
        assert_eq!(response.status().as_u16(), 400);
        assert_eq!(response.headers()[X_REQUEST_ID], "req-42");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": {
                    "code": "VALIDATION_ERROR",
                    "message": "Invalid project",
                    "issues": [{"path": "name", "message": "required"}]
                },
                "request_id": "req-42"
            })
        );
    }

    #[tokio::test]
    async fn test_success_body_gets_request_id() {
        let response = json_with_request_id(&serde_json::json!({"ok": true}), "r1").unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"ok": true, "request_id": "r1"}));
    }
}
