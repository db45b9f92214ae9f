//! HTTP Error Mapping
//!
//! Maps application errors to status codes and `{ error, message }` bodies.
//! Internal details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use codequal_core::error::AppError;
use codequal_core::port::AuthError;

/// Machine-readable error codes
pub mod code {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const MISSING_CREDENTIAL: &str = "missing_credential";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code::VALIDATION_ERROR, message)
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            code::INTERNAL_ERROR,
            "Internal server error",
        )
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code::UNAUTHORIZED, err.to_string())
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => Self::bad_request(msg),
            AppError::MissingCredential => Self::new(
                StatusCode::BAD_REQUEST,
                code::MISSING_CREDENTIAL,
                err.to_string(),
            ),
            AppError::Authentication(e) => e.into(),
            AppError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, code::NOT_FOUND, msg),
            other => {
                error!(error = %other, "Request failed with an internal error");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::MissingCredential, StatusCode::BAD_REQUEST),
            (
                AppError::Authentication(AuthError::ExpiredToken),
                StatusCode::UNAUTHORIZED,
            ),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(AppError::Internal("db password is hunter2".into()));
        assert_eq!(err.message, "Internal server error");
        assert_eq!(err.code, code::INTERNAL_ERROR);
    }

    #[test]
    fn test_missing_credential_code() {
        let err = ApiError::from(AppError::MissingCredential);
        assert_eq!(err.code, code::MISSING_CREDENTIAL);
    }
}
