use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::app::dto::HealthReport;
use crate::app::services::AppServices;

/// Liveness plus the state of the database and the job store.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let (database, jobs) = services.health().await;
    let healthy = database != "down" && jobs.is_some();
    let report = HealthReport {
        status: if healthy { "healthy" } else { "degraded" },
        database,
        jobs,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}
