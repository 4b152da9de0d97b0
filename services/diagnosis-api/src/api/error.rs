//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every endpoint returns the
//! same `{success: false, error, message?, details?}` envelope.
//!
//! # Key invariants and assumptions
//! - `status` always matches the category in `body.error`.
//! - Internal errors log details server-side but return a generic message.
use crate::store::StoreError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use diagnosis_common::{ErrorResponse, FieldError};

const INTERNAL_MESSAGE: &str = "An unexpected error occurred";

/// Structured API error returned by handlers and extractors.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use diagnosis_api::api::error::api_not_found;
///
/// let err = api_not_found("Diagnosis not found");
/// assert_eq!(err.status, StatusCode::NOT_FOUND);
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build a 404 for a missing record.
pub fn api_not_found(message: &str) -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        body: ErrorResponse::new("Not found", Some(message.to_string())),
    }
}

/// Build the 404 returned for unknown routes.
pub fn api_route_not_found(method: &str, path: &str) -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        body: ErrorResponse::new(
            "Route not found",
            Some(format!("Cannot {method} {path}")),
        ),
    }
}

/// Build a 400 carrying per-field validation details.
pub fn api_validation_error(details: Vec<FieldError>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        body: ErrorResponse::validation(details),
    }
}

/// Build the 400 returned for an update with no fields.
pub fn api_empty_patch() -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        body: ErrorResponse::new("No fields to update", None),
    }
}

/// Build a 500 from a store error.
///
/// Logs `context` and the store error; the caller only sees a generic message.
pub fn api_internal(context: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, context, "diagnosis storage error");
    api_internal_message()
}

/// Build a 500 without a store error to log.
pub fn api_internal_message() -> ApiError {
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse::new("Internal server error", Some(INTERNAL_MESSAGE.to_string())),
    }
}

/// Map a store error onto the response for a record lookup.
pub fn api_from_store(err: StoreError, not_found_message: &str, context: &str) -> ApiError {
    match err {
        StoreError::NotFound(_) => api_not_found(not_found_message),
        StoreError::EmptyPatch => api_empty_patch(),
        other => api_internal(context, &other),
    }
}
