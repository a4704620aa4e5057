use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::routing::{get, post};
use axum::Router;

use kluster_business::dto::InvoiceRequest;
use kluster_business::parse_status;

use crate::app::dto::InvoiceListQuery;
use crate::app::errors::{ApiResult, ValidatedJson, created, no_content, ok};
use crate::app::services::AppServices;
use crate::context::Caller;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/:id", get(get_invoice).put(update_invoice).delete(delete_invoice))
        .route("/:id/cancel", post(cancel_invoice))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    ValidatedJson(body): ValidatedJson<InvoiceRequest>,
) -> ApiResult {
    created(services.invoices.create(&caller, body).await)
}

/// `?status=Pending|Paid|Overdue|Cancelled` narrows the list.
pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Query(query): Query<InvoiceListQuery>,
) -> ApiResult {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    ok(services.invoices.list(&caller, status).await)
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult {
    ok(services.invoices.get(&caller, &id).await)
}

pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<InvoiceRequest>,
) -> ApiResult {
    ok(services.invoices.update(&caller, &id, body).await)
}

pub async fn cancel_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult {
    ok(services.invoices.cancel(&caller, &id).await)
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult {
    no_content(services.invoices.delete(&caller, &id).await)
}
