use axum::Router;

pub mod auth;
pub mod clients;
pub mod invoices;
pub mod payments;
pub mod products;
pub mod system;
pub mod user;

/// Endpoints reachable without a token.
pub fn anonymous() -> Router {
    Router::new().nest("/auth", auth::router())
}

/// Endpoints behind the auth middleware.
pub fn protected() -> Router {
    Router::new()
        .nest("/user", user::router())
        .nest("/clients", clients::router())
        .nest("/products", products::router())
        .nest("/invoices", invoices::router())
        .nest("/payments", payments::router())
}
