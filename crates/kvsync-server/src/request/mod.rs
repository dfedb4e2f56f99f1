//! Request data transfer objects.

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use validator::Validate;

/// Most deltas the concurrent counter demo accepts in one request.
pub const MAX_CONCURRENT_DELTAS: u64 = 64;

/// Deltas fired when the concurrent demo is called without a body.
pub const DEFAULT_CONCURRENT_DELTAS: [i64; 5] = [1, 2, 3, 4, 5];

/// JSON body that has passed its `validator` rules.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Plain key write.
#[derive(Debug, Deserialize, Validate)]
pub struct SetValueRequest {
    #[validate(length(min = 1, max = 512))]
    pub key: String,
    pub value: String,
}

/// Key write with an expiry.
#[derive(Debug, Deserialize, Validate)]
pub struct ExpireRequest {
    #[validate(length(min = 1, max = 512))]
    pub key: String,
    pub value: String,
    /// Seconds until the key expires.
    #[validate(range(min = 1))]
    pub ttl: u64,
}

/// Leaderboard score submission.
#[derive(Debug, Deserialize, Validate)]
pub struct RecordScoreRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    pub score: f64,
}

/// New user row.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// New liked tag for a user.
#[derive(Debug, Deserialize, Validate)]
pub struct LikedTagRequest {
    #[validate(length(min = 1, max = 200))]
    pub liked_tag: String,
}

/// Single counter delta.
#[derive(Debug, Deserialize, Validate)]
pub struct DeltaRequest {
    pub delta: i64,
}

/// Deltas for the concurrent counter demo.
#[derive(Debug, Deserialize, Validate)]
pub struct ConcurrentRequest {
    #[validate(length(min = 1, max = MAX_CONCURRENT_DELTAS))]
    pub deltas: Vec<i64>,
}

impl Default for ConcurrentRequest {
    fn default() -> Self {
        Self {
            deltas: DEFAULT_CONCURRENT_DELTAS.to_vec(),
        }
    }
}
