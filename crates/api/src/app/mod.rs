//! HTTP application wiring.
//!
//! - `services.rs`: adapter selection and background workers
//! - `routes/`: handlers, one file per resource
//! - `dto.rs`: response envelopes
//! - `errors.rs`: mapping service results onto responses

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use kluster_infra::config::{CorsPolicy, CorsSettings};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub const SIMPLE_DEV_ORIGIN: &str = "https://simple-biz.fly.dev";

fn cors_layer(settings: &CorsSettings) -> CorsLayer {
    match settings.policy {
        CorsPolicy::AllowSimpleDev => CorsLayer::new()
            .allow_origin(HeaderValue::from_static(SIMPLE_DEV_ORIGIN))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(Any),
        CorsPolicy::AllowAnyOrigin => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<services::AppServices>, cors: &CorsSettings) -> Router {
    let auth_state = middleware::AuthState {
        tokens: services.tokens.clone(),
    };

    // Protected routes: require a valid bearer token.
    let protected = routes::protected().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    let api = routes::anonymous().merge(protected);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors))
                .layer(Extension(services)),
        )
}

