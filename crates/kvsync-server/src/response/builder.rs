//! Response builder utilities.

use super::types::{ApiResponse, ResponseMeta};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Builder for constructing API responses.
pub struct ResponseBuilder<T> {
    status: StatusCode,
    data: T,
    meta: ResponseMeta,
}

impl<T: serde::Serialize> ResponseBuilder<T> {
    /// Create a new response builder.
    pub fn new(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
            meta: ResponseMeta::now(),
        }
    }

    /// Set HTTP status code.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Build the response.
    pub fn build(self) -> Response {
        let response = ApiResponse::success_with_meta(self.data, self.meta);
        (self.status, Json(response)).into_response()
    }
}

/// Create a 200 OK response.
pub fn ok<T: serde::Serialize>(data: T) -> Response {
    ResponseBuilder::new(data).build()
}

/// Create a 201 Created response.
pub fn created<T: serde::Serialize>(data: T) -> Response {
    ResponseBuilder::new(data)
        .status(StatusCode::CREATED)
        .build()
}

/// Create a 202 Accepted response.
pub fn accepted<T: serde::Serialize>(data: T) -> Response {
    ResponseBuilder::new(data)
        .status(StatusCode::ACCEPTED)
        .build()
}
