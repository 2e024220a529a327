//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Home page
//! GET  /about, /gem-knowledge     - Content pages
//! GET  /pages/{slug}              - Any content page
//!
//! # Auth
//! GET  /auth/login                - Login page
//! POST /auth/login                - Login action
//! GET  /auth/register             - Register page
//! POST /auth/register             - Register action
//! POST /auth/logout               - Logout action
//! GET  /api/session               - Auth state as JSON
//!
//! # Account (signed in)
//! GET  /account                   - Profile, business details, quotations
//! POST /account/refresh           - Re-fetch the profile
//! GET  /account/suspended         - Why the inventory is unavailable
//!
//! # Inventory (approved users and admins)
//! GET  /inventory                 - Gem table with filters
//! GET  /inventory/table           - Table partial for one action
//! GET  /inventory/{id}            - Gem detail
//! GET  /quotations/new            - Quotation form
//! POST /quotations                - Submit quotation
//!
//! # Admin
//! GET  /admin/gems                - Gem table
//! GET  /admin/gems/export.csv     - CSV export of the current filter
//! GET  /admin/gems/new            - New gem form
//! POST /admin/gems                - Create gem
//! GET  /admin/gems/{id}/edit      - Edit form
//! POST /admin/gems/{id}           - Update gem
//! POST /admin/gems/{id}/delete    - Delete gem
//! POST /admin/gems/{id}/assets    - Upload images/videos/certificates
//! GET  /admin/quotations          - Quotation list
//! POST /admin/quotations/{id}/status - Decide a quotation
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod home;
pub mod inventory;
pub mod pages;
pub mod quotations;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/refresh", post(account::refresh))
        .route("/suspended", get(account::suspended))
}

/// Create the inventory routes router.
///
/// `/inventory/table` is mounted separately, behind the partials rate limiter.
pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(inventory::index))
        .route("/{id}", get(inventory::show))
}

/// Create the quotation routes router.
pub fn quotation_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(quotations::create))
        .route("/new", get(quotations::new_form))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/gems", get(admin::gems::index).post(admin::gems::create))
        .route("/gems/export.csv", get(admin::gems::export_csv))
        .route("/gems/new", get(admin::gems::new_form))
        .route("/gems/{id}", post(admin::gems::update))
        .route("/gems/{id}/edit", get(admin::gems::edit_form))
        .route("/gems/{id}/delete", post(admin::gems::delete))
        .route(
            "/gems/{id}/assets",
            post(admin::gems::upload_assets)
                .layer(DefaultBodyLimit::max(admin::gems::UPLOAD_BODY_LIMIT)),
        )
        .route("/quotations", get(admin::quotations::index))
        .route(
            "/quotations/{id}/status",
            post(admin::quotations::decide),
        )
}

/// Create all page routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/about", get(pages::about))
        .route("/gem-knowledge", get(pages::gem_knowledge))
        .route("/pages/{slug}", get(pages::show))
        .nest("/account", account_routes())
        .nest("/inventory", inventory_routes())
        .nest("/quotations", quotation_routes())
        .nest("/admin", admin_routes())
}
