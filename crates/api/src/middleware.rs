use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use kluster_core::error::common;
use kluster_users::TokenService;

use crate::app::errors::ApiError;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
}

/// Resolve the bearer token into a [`CurrentUser`](kluster_core::CurrentUser)
/// request extension, or answer with a 401 envelope.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers()).ok_or(common::UNAUTHORIZED)?;

    let user = state.tokens.authenticate(token).map_err(|err| {
        tracing::debug!(error = %err, "rejected access token");
        common::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
