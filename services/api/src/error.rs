//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// The user or test does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// A non-owner asked for an inactive test
    #[error("Test is private")]
    PrivateAccessDenied,

    /// Missing or invalid access and refresh tokens
    #[error("Unauthorized")]
    Unauthorized,

    /// A mutation was attempted by someone other than the test's author
    #[error("Not the author of this test")]
    NotAuthor,

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The durable store failed
    #[error("Repository error: {0}")]
    Repository(DatabaseError),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Repository(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            ApiError::PrivateAccessDenied => {
                (StatusCode::FORBIDDEN, "Test is private".to_string())
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::NotAuthor => (
                StatusCode::FORBIDDEN,
                "Not the author of this test".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Repository(e) => {
                error!("Repository failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_not_found_maps_to_not_found() {
        let err = ApiError::from(DatabaseError::NotFound("test `1`".to_string()));
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = ApiError::from(DatabaseError::Conflict("dup".to_string()));
        assert!(matches!(err, ApiError::Repository(_)));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::NotFound("user".to_string()), StatusCode::NOT_FOUND),
            (ApiError::PrivateAccessDenied, StatusCode::FORBIDDEN),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::NotAuthor, StatusCode::FORBIDDEN),
            (
                ApiError::BadRequest("nope".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Repository(DatabaseError::Migration("x".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::InternalServerError,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
