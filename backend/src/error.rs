//! Application error handling
//!
//! This module provides unified error handling for the API,
//! converting internal errors to appropriate HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kummerkasten_shared::{AuthError, ErrorDetail, ErrorResponse};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// API error type that can be converted to HTTP responses
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Failure of an operation on the ordered question/answer list
#[derive(Error, Debug)]
pub enum RepositionError {
    #[error("Question/answer pair {0} not found")]
    ItemNotFound(Uuid),

    #[error("Position {requested} is outside 0..{len}")]
    PositionOutOfRange { requested: i32, len: i64 },

    #[error("Concurrent modification detected")]
    ConcurrentModification,

    #[error("Question already exists")]
    DuplicateQuestion,

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Internal(err) => {
                error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                field: None,
            },
        });

        (status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if err.is_fatal() {
            ApiError::Internal(anyhow::Error::new(err))
        } else {
            ApiError::Unauthorized(err.to_string())
        }
    }
}

impl From<RepositionError> for ApiError {
    fn from(err: RepositionError) -> Self {
        match err {
            RepositionError::ItemNotFound(id) => {
                ApiError::NotFound(format!("Question/answer pair {} not found", id))
            }
            RepositionError::PositionOutOfRange { requested, len } => ApiError::BadRequest(format!(
                "Position {} is out of range, expected 0..{}",
                requested, len
            )),
            RepositionError::ConcurrentModification => ApiError::Conflict(
                "The list was modified concurrently, retry the request".to_string(),
            ),
            RepositionError::DuplicateQuestion => {
                ApiError::Conflict("Question already exists".to_string())
            }
            RepositionError::Store(err) => ApiError::Internal(err),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status() {
        let error = ApiError::Validation("Invalid input".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status() {
        let error = ApiError::NotFound("User not found".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_credential_maps_to_401() {
        let response = ApiError::from(AuthError::InvalidCredential).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_fatal_auth_errors_map_to_500() {
        let cases = [
            AuthError::EntropySourceFailure("rng".to_string()),
            AuthError::HashingFailure("argon2".to_string()),
            AuthError::MissingPepper,
        ];

        for error in cases {
            let response = ApiError::from(error).into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_reposition_errors_status() {
        let cases = [
            (RepositionError::ItemNotFound(Uuid::new_v4()), StatusCode::NOT_FOUND),
            (
                RepositionError::PositionOutOfRange { requested: 9, len: 3 },
                StatusCode::BAD_REQUEST,
            ),
            (RepositionError::ConcurrentModification, StatusCode::CONFLICT),
            (RepositionError::DuplicateQuestion, StatusCode::CONFLICT),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), status);
        }
    }
}
