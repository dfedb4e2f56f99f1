//! Error response implementation and conversions from domain errors.

use super::types::ApiError;
use crate::db::RepoError;
use crate::leaderboard::LeaderboardError;
use crate::score::ScoreError;
use crate::store::StoreError;
use crate::sync::{SyncError, UnknownPolicy};
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, warn};

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<HashMap<String, Vec<String>>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            error!(
                error = %self,
                code = self.error_code(),
                "Server error occurred"
            );
        } else if matches!(self, ApiError::ContentionExhausted { .. }) {
            warn!(error = %self, code = self.error_code(), "Counter contention");
        }

        let status = self.status_code();
        let code = self.error_code();

        let (message, details, fields) = match &self {
            ApiError::ValidationError(field_errors) => {
                (self.to_string(), None, Some(field_errors.clone()))
            }
            ApiError::ResourceNotFound { resource, id } => {
                let details = serde_json::json!({
                    "resource": resource,
                    "id": id
                });
                (format!("{} '{}' not found", resource, id), Some(details), None)
            }
            ApiError::ContentionExhausted { attempts } => (
                self.to_string(),
                Some(serde_json::json!({ "attempts": attempts })),
                None,
            ),
            ApiError::PartialSync {
                written,
                failed,
                cause,
            } => {
                let details = serde_json::json!({
                    "written": written,
                    "failed": failed,
                    "cause": cause
                });
                (self.to_string(), Some(details), None)
            }
            ApiError::Database(err) => {
                let message = if cfg!(debug_assertions) {
                    format!("Database error: {}", err)
                } else {
                    "A database error occurred".to_string()
                };
                (message, None, None)
            }
            _ => (self.to_string(), None, None),
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorBody {
                code,
                message,
                details,
                fields,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => ApiError::StoreUnavailable(msg),
            StoreError::WrongType(msg) => ApiError::UnprocessableEntity(msg),
            StoreError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            StoreError::Backend(msg) => ApiError::UpstreamError(msg),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Unavailable(msg) => ApiError::StoreUnavailable(msg),
            RepoError::Duplicate(id) => ApiError::DuplicateEntry(format!("user '{}'", id)),
            RepoError::Database(err) => ApiError::Database(err),
        }
    }
}

impl From<ScoreError> for ApiError {
    fn from(err: ScoreError) -> Self {
        match err {
            ScoreError::ContentionExhausted { attempts } => {
                ApiError::ContentionExhausted { attempts }
            }
            ScoreError::InvalidCounter { .. } | ScoreError::Overflow { .. } => {
                ApiError::UnprocessableEntity(err.to_string())
            }
            ScoreError::Store(err) => err.into(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::UserNotFound(id) => ApiError::ResourceNotFound {
                resource: "User".to_string(),
                id,
            },
            SyncError::Cache(err) => err.into(),
            SyncError::Database(err) => err.into(),
            SyncError::PartialSync {
                written,
                failed,
                cause,
            } => ApiError::PartialSync {
                written,
                failed,
                cause: cause.to_string(),
            },
            SyncError::QueueFull | SyncError::QueueClosed => {
                ApiError::ServiceTemporarilyUnavailable(err.to_string())
            }
        }
    }
}

impl From<LeaderboardError> for ApiError {
    fn from(err: LeaderboardError) -> Self {
        match err {
            LeaderboardError::UserNotFound(id) => ApiError::ResourceNotFound {
                resource: "Leaderboard entry".to_string(),
                id,
            },
            LeaderboardError::InvalidScore => ApiError::BadRequest(err.to_string()),
            LeaderboardError::Store(err) => err.into(),
        }
    }
}

impl From<UnknownPolicy> for ApiError {
    fn from(err: UnknownPolicy) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        ApiError::ValidationError(fields)
    }
}
