use std::sync::Arc;

use axum::extract::Extension;
use axum::routing::get;
use axum::Router;

use kluster_users::dto::UpdateUserRequest;

use crate::app::errors::{ApiResult, ValidatedJson, no_content, ok};
use crate::app::services::AppServices;
use crate::context::Caller;

pub fn router() -> Router {
    Router::new().route("/", get(get_user).put(update_user))
}

pub async fn get_user(Extension(services): Extension<Arc<AppServices>>, Caller(caller): Caller) -> ApiResult {
    ok(services.users.get_logged_in_user(&caller).await)
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    ValidatedJson(body): ValidatedJson<UpdateUserRequest>,
) -> ApiResult {
    no_content(services.users.update_user(&caller, body).await)
}
