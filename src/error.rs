//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code. Variants that
/// wrap internal details (database, upstream services) log those details and
/// return a generic message to the client.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Request body failed schema validation. Rendered with per-field messages.
    #[error("Validation failed")]
    Validation(#[from] validator::ValidationErrors),

    /// Request body or parameters are invalid.
    #[error("{0}")]
    InvalidRequest(String),

    /// No valid session was presented.
    #[error("Authentication required")]
    Unauthorized,

    /// Webhook signature missing or not matching.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Authenticated, but not allowed to do this.
    #[error("{0}")]
    Forbidden(String),

    /// Requested resource does not exist or doesn't belong to the caller.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The caller's credit balance cannot cover the operation.
    #[error("Insufficient credits")]
    InsufficientCredits,

    /// Caller must wait before retrying (OTP resend cooldown).
    #[error("{0}")]
    TooManyRequests(String),

    /// The integration backing this feature is switched off or not configured.
    #[error("Feature disabled")]
    FeatureDisabled,

    /// An external service (payment processor, storage, provider, SMTP) failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Anything else that is our fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and stable machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::InvalidSignature => (StatusCode::BAD_REQUEST, "invalid_signature"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::InsufficientCredits => {
                (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_credits")
            }
            AppError::TooManyRequests(_) => (StatusCode::TOO_MANY_REQUESTS, "too_many_requests"),
            AppError::FeatureDisabled => (StatusCode::SERVICE_UNAVAILABLE, "feature_disabled"),
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

/// Flatten validator output into `{ field: [message, ...] }`.
fn field_messages(errors: &validator::ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid {}", e.code))
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "success": false,
///   "error": {
///     "code": "validation_error",
///     "message": "Validation failed",
///     "fields": { "email": ["must be a valid email address"] }
///   }
/// }
/// ```
///
/// `fields` is only present for validation errors.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "An internal error occurred".to_string()
            }
            AppError::Upstream(detail) => {
                tracing::error!(error = %detail, "Upstream service error");
                "An external service failed, please try again later".to_string()
            }
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let AppError::Validation(ref errors) = self {
            error["fields"] = json!(field_messages(errors));
        }

        let body = Json(json!({
            "success": false,
            "error": error,
        }));

        (status, body).into_response()
    }
}
