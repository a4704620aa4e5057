use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::routing::get;
use axum::Router;

use kluster_business::dto::ProductRequest;

use crate::app::errors::{ApiResult, ValidatedJson, created, no_content, ok};
use crate::app::services::AppServices;
use crate::context::Caller;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    ValidatedJson(body): ValidatedJson<ProductRequest>,
) -> ApiResult {
    created(services.products.create(&caller, body).await)
}

pub async fn list_products(Extension(services): Extension<Arc<AppServices>>, Caller(caller): Caller) -> ApiResult {
    ok(services.products.list(&caller).await)
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult {
    ok(services.products.get(&caller, &id).await)
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<ProductRequest>,
) -> ApiResult {
    ok(services.products.update(&caller, &id, body).await)
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult {
    no_content(services.products.delete(&caller, &id).await)
}
