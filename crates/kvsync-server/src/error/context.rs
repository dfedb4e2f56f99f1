//! Error context utilities.

use super::types::ApiError;

/// Create a not found error for a specific resource.
pub fn not_found(resource: &str, id: &str) -> ApiError {
    ApiError::ResourceNotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}
