//! Error types for the raffle server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use participant_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Raffle server error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("This phone number is already registered for the raffle. Only one registration per number is allowed.")]
    DuplicatePhone,

    #[error("Sorry, the raffle is only open to residents of Makhachkala and Kaspiysk.")]
    LocationRejected,

    /// Carries the requested list position as given in the path.
    #[error("Participant not found")]
    NotFound(String),

    #[error("Access denied")]
    Forbidden,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to create the spreadsheet: {0}")]
    Export(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::DuplicatePhone => (StatusCode::BAD_REQUEST, "DUPLICATE_PHONE"),
            AppError::LocationRejected => (StatusCode::BAD_REQUEST, "LOCATION_REJECTED"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            AppError::Export(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_ERROR"),
            AppError::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { index, .. } => AppError::NotFound(index.to_string()),
            StoreError::DuplicatePhone(_) => AppError::DuplicatePhone,
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        AppError::Export(e.to_string())
    }
}

impl From<askama::Error> for AppError {
    fn from(e: askama::Error) -> Self {
        AppError::Internal(format!("Template rendering failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::DuplicatePhone.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NotFound("3".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: AppError = StoreError::NotFound { index: 7, len: 2 }.into();
        assert!(matches!(err, AppError::NotFound(ref index) if index == "7"));
    }
}
