//! API error types.

use crate::sync::Tier;
use axum::http::StatusCode;
use std::collections::HashMap;
use thiserror::Error;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// API error enum covering all error cases.
#[derive(Debug, Error)]
pub enum ApiError {
    // 400 Bad Request
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    ValidationError(HashMap<String, Vec<String>>),

    // 404 Not Found
    #[error("Resource not found")]
    ResourceNotFound { resource: String, id: String },

    // 409 Conflict
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Counter update gave up after {attempts} conflicting attempts")]
    ContentionExhausted { attempts: u32 },

    // 422 Unprocessable Entity
    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    // 500 Internal Server Error
    #[error("Database error")]
    Database(#[source] sqlx::Error),

    #[error("{written} was updated but the {failed} write failed")]
    PartialSync {
        written: Tier,
        failed: Tier,
        cause: String,
    },

    // 502 Bad Gateway
    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    // 503 Service Unavailable
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Service temporarily unavailable: {0}")]
    ServiceTemporarilyUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::ValidationError(_) => StatusCode::BAD_REQUEST,

            Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,

            Self::DuplicateEntry(_) | Self::ContentionExhausted { .. } => StatusCode::CONFLICT,

            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,

            Self::Database(_) | Self::PartialSync { .. } => StatusCode::INTERNAL_SERVER_ERROR,

            Self::UpstreamError(_) => StatusCode::BAD_GATEWAY,

            Self::StoreUnavailable(_) | Self::ServiceTemporarilyUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Get error code for client handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::ValidationError(_) => "validation_error",
            Self::ResourceNotFound { .. } => "resource_not_found",
            Self::DuplicateEntry(_) => "duplicate_entry",
            Self::ContentionExhausted { .. } => "contention_exhausted",
            Self::UnprocessableEntity(_) => "unprocessable_entity",
            Self::Database(_) => "database_error",
            Self::PartialSync { .. } => "partial_sync",
            Self::UpstreamError(_) => "upstream_error",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::ServiceTemporarilyUnavailable(_) => "service_temporarily_unavailable",
        }
    }

    /// Check if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}
