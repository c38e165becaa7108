//! API error taxonomy.
//!
//! Handlers return [`ApiError`]; its `IntoResponse` only sets the status and
//! stashes the error in the response extensions. The request-context
//! middleware renders the uniform body, because only it knows the
//! correlation id.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// A single field-level validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("{resource}{} not found", id_suffix(.id))]
    NotFound {
        resource: String,
        id: Option<String>,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    HealthCheckFailed(String),

    /// Detail is logged, never rendered.
    #[error("internal error: {0}")]
    Internal(String),
}

fn id_suffix(id: &Option<String>) -> String {
    id.as_ref().map(|id| format!(" with id {id}")).unwrap_or_default()
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::HealthCheckFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::HealthCheckFailed(_) => "HEALTH_CHECK_FAILED",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        }
    }

    pub fn issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            ApiError::Validation { issues, .. } if !issues.is_empty() => Some(issues),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases = [
            (
                ApiError::Validation {
                    message: "bad".into(),
                    issues: vec![],
                },
                400,
                "VALIDATION_ERROR",
            ),
            (ApiError::not_found("Project"), 404, "NOT_FOUND"),
            (ApiError::Unauthorized("Unauthorized".into()), 401, "UNAUTHORIZED"),
            (ApiError::Forbidden("Forbidden".into()), 403, "FORBIDDEN"),
            (ApiError::Conflict("exists".into()), 409, "CONFLICT"),
            (ApiError::HealthCheckFailed("x".into()), 500, "HEALTH_CHECK_FAILED"),
            (ApiError::Internal("x".into()), 500, "INTERNAL_SERVER_ERROR"),
        ];
        for (error, status, code) in cases {
            assert_eq!(error.status().as_u16(), status);
            assert_eq!(error.code(), code);
        }
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(ApiError::not_found("Route").to_string(), "Route not found");
        assert_eq!(
            ApiError::not_found_with_id("Project", "p-1").to_string(),
            "Project with id p-1 not found"
        );
    }

    #[test]
    fn test_internal_detail_hidden() {
        let error = ApiError::Internal("db password is hunter2".into());
        assert!(!error.public_message().contains("hunter2"));
    }

    #[test]
    fn test_into_response_carries_error() {
        let response = ApiError::Conflict("dup".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(response.extensions().get::<ApiError>().is_some());
    }
}
