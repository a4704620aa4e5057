use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::routing::{get, post};
use axum::Router;

use kluster_payments::dto::InitializePaymentRequest;

use crate::app::errors::{ApiResult, ValidatedJson, created, ok};
use crate::app::services::AppServices;
use crate::context::Caller;

pub fn router() -> Router {
    Router::new()
        .route("/initialize", post(initialize_payment))
        .route("/verify/:reference", get(verify_payment))
        .route("/:id", get(get_payment))
}

pub async fn initialize_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    ValidatedJson(body): ValidatedJson<InitializePaymentRequest>,
) -> ApiResult {
    created(services.payments.initialize(&caller, body).await)
}

/// Any signed-in caller may confirm a reference; the gateway is the
/// authority on whether it was paid.
pub async fn verify_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(_caller): Caller,
    Path(reference): Path<String>,
) -> ApiResult {
    ok(services.payments.verify(&reference).await)
}

pub async fn get_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult {
    ok(services.payments.get(&caller, &id).await)
}
