use axum::Json;
use axum::extract::{FromRequest, OptionalFromRequest, Request};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// `Json<T>` whose rejection is rendered in the API error envelope.
/// A missing field or a malformed body is a 400 `VALIDATION_ERROR`.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request(
        req: Request,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state).await?;
            Ok(ApiJson(value))
        }
    }
}

/// Optional bodies (DELETE with a password) are absent when no JSON
/// content type is sent.
impl<S, T> OptionalFromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request(
        req: Request,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Option<Self>, Self::Rejection>> + Send {
        async move {
            let body = <Json<T> as OptionalFromRequest<S>>::from_request(req, state).await?;
            Ok(body.map(|Json(value)| ApiJson(value)))
        }
    }
}
