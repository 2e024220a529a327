//! Gem Vault Storefront library.
//!
//! The web front-end for the Gem Vault inventory: marketing pages, the
//! approved-buyer inventory browser, quotations, and staff gem management.
//! All business data lives behind the inventory backend's REST API.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Static assets, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/storefront/static";

/// Markdown content, relative to the workspace root.
pub const CONTENT_DIR: &str = "crates/storefront/content";

/// Build the full application router (without the Sentry layers, which
/// need a configured client and are added by the binary).
pub fn build_router(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    let auth = routes::auth_routes().layer(middleware::auth_rate_limiter());
    let partials = Router::new()
        .route("/inventory/table", get(routes::inventory::table))
        .route("/api/session", get(routes::auth::session))
        .layer(middleware::api_rate_limiter());

    Router::new()
        .route("/health", get(routes::home::health))
        .route("/health/ready", get(routes::home::ready))
        .merge(partials)
        .merge(routes::routes())
        .nest("/auth", auth)
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(session_layer)
        .layer(from_fn_with_state(state.clone(), middleware::csp_middleware))
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
