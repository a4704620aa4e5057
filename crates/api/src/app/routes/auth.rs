use std::sync::Arc;

use axum::extract::Extension;
use axum::routing::post;
use axum::Router;

use kluster_users::dto::{ConfirmEmailRequest, LoginRequest, RegisterRequest, ResendOtpRequest};

use crate::app::errors::{ApiResult, ValidatedJson, created, no_content, ok};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/confirm-email", post(confirm_email))
        .route("/resend-otp", post(resend_otp))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> ApiResult {
    created(services.users.register(body).await)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> ApiResult {
    ok(services.users.login(body).await)
}

pub async fn confirm_email(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<ConfirmEmailRequest>,
) -> ApiResult {
    no_content(services.users.confirm_email(body).await)
}

pub async fn resend_otp(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<ResendOtpRequest>,
) -> ApiResult {
    no_content(services.users.resend_otp(body).await)
}
