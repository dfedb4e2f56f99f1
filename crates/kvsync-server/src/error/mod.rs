//! Error handling for the kvsync API server.

pub mod context;
pub mod response;
pub mod types;

pub use context::not_found;
pub use types::{ApiError, ApiResult};
