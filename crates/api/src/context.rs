use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use kluster_core::CurrentUser;
use kluster_core::error::common;

use crate::app::errors::ApiError;

/// The authenticated caller, placed on the request by
/// [`auth_middleware`](crate::middleware::auth_middleware).
#[derive(Debug, Clone)]
pub struct Caller(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .map(Caller)
            .ok_or_else(|| common::UNAUTHORIZED.into())
    }
}
