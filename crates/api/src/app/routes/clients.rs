use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::routing::get;
use axum::Router;

use kluster_business::dto::ClientRequest;

use crate::app::errors::{ApiResult, ValidatedJson, created, no_content, ok};
use crate::app::services::AppServices;
use crate::context::Caller;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route("/:id", get(get_client).put(update_client).delete(delete_client))
}

pub async fn create_client(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    ValidatedJson(body): ValidatedJson<ClientRequest>,
) -> ApiResult {
    created(services.clients.create(&caller, body).await)
}

pub async fn list_clients(Extension(services): Extension<Arc<AppServices>>, Caller(caller): Caller) -> ApiResult {
    ok(services.clients.list(&caller).await)
}

pub async fn get_client(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult {
    ok(services.clients.get(&caller, &id).await)
}

pub async fn update_client(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<ClientRequest>,
) -> ApiResult {
    ok(services.clients.update(&caller, &id, body).await)
}

pub async fn delete_client(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult {
    no_content(services.clients.delete(&caller, &id).await)
}
