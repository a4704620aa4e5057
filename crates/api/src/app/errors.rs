//! Mapping service results onto HTTP responses.
//!
//! Handlers return `Result<Response, ApiError>`; both sides use the
//! envelopes from [`dto`](super::dto).

use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, async_trait};
use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use kluster_core::error::common;
use kluster_core::{ServiceError, ServiceErrors, ServiceResult, validate_request};

use super::dto::{ErrorEnvelope, SuccessEnvelope};

/// A failed request, rendered as the uniform error envelope.
#[derive(Debug)]
pub struct ApiError(pub ServiceErrors);

impl From<ServiceErrors> for ApiError {
    fn from(errors: ServiceErrors) -> Self {
        Self(errors)
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        Self(error.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope::from(&self.0);
        let status = StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = %self.0.first().code(), "request failed");
        }
        (status, Json(envelope)).into_response()
    }
}

pub type ApiResult = Result<Response, ApiError>;

/// `200` with the success envelope.
pub fn ok<T: Serialize>(result: ServiceResult<T>) -> ApiResult {
    with_status(StatusCode::OK, result)
}

/// `201` with the success envelope.
pub fn created<T: Serialize>(result: ServiceResult<T>) -> ApiResult {
    with_status(StatusCode::CREATED, result)
}

/// `204` without a body.
pub fn no_content(result: ServiceResult<()>) -> ApiResult {
    result?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

fn with_status<T: Serialize>(status: StatusCode, result: ServiceResult<T>) -> ApiResult {
    let data = result?;
    Ok((status, Json(SuccessEnvelope::new(data))).into_response())
}

/// JSON body that has passed its `validator` rules.
///
/// Unreadable bodies are rejected with `Request.Invalid`; rule failures with
/// every validation descriptor, before the handler runs.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!(error = %rejection.body_text(), "unreadable request body");
            ApiError::from(common::INVALID_REQUEST)
        })?;
        validate_request(&value)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    struct Named {
        #[validate(length(min = 3, code = "Invalid", message = "Name is too short."))]
        name: String,
    }

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_json_is_request_invalid() {
        let rejection = ValidatedJson::<Named>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();
        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await["errors"][0]["code"], "Request.Invalid");
    }

    #[tokio::test]
    async fn rule_failures_are_validation_errors() {
        let rejection = ValidatedJson::<Named>::from_request(json_request(r#"{"name":"al"}"#), &())
            .await
            .unwrap_err();
        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await["errors"][0]["code"], "Name.Invalid");
    }

    #[tokio::test]
    async fn valid_bodies_pass_through() {
        let ValidatedJson(named) = ValidatedJson::<Named>::from_request(json_request(r#"{"name":"Ada"}"#), &())
            .await
            .unwrap();
        assert_eq!(named.name, "Ada");
    }

    #[tokio::test]
    async fn responders_pick_status_codes() {
        assert_eq!(created(Ok("x")).unwrap().status(), StatusCode::CREATED);
        assert_eq!(no_content(Ok(())).unwrap().status(), StatusCode::NO_CONTENT);

        let response = ok::<()>(Err(common::UNAUTHORIZED.into())).unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_of(response).await["statusCode"], 401);
    }
}
