//! Home page and health check handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::instrument;

use gemvault_core::Gem;
use gemvault_core::guard::can_access_inventory;
use gemvault_core::query::{GemFilters, GemQuery};

use crate::filters;
use crate::middleware::CspNonce;
use crate::models::Nav;
use crate::services::auth::AuthContext;
use crate::state::AppState;

/// How many gems the home page features.
const FEATURED_COUNT: usize = 6;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nav: Nav,
    pub featured: Vec<Gem>,
}

/// Display the home page.
///
/// Featured gems are best effort: the backend only lists inventory to
/// approved users, so anonymous visitors and backend outages get an empty
/// showcase rather than an error page.
#[instrument(skip(state, auth, nonce))]
pub async fn home(
    State(state): State<AppState>,
    auth: AuthContext,
    nonce: CspNonce,
) -> impl IntoResponse {
    let query = GemQuery {
        filters: GemFilters {
            availability: Some(true),
            ..GemFilters::default()
        },
        page_size: 10,
        ..GemQuery::default()
    };

    let can_browse = auth
        .user()
        .is_some_and(|u| can_access_inventory(u.role, u.status));

    let featured = match auth.token() {
        Some(token) if can_browse => match state.api().list_gems(Some(token), &query).await {
            Ok(page) => page.gems.into_iter().take(FEATURED_COUNT).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load featured gems");
                Vec::new()
            }
        },
        _ => Vec::new(),
    };

    HomeTemplate {
        nav: Nav::new(&auth, &nonce),
        featured,
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the inventory backend is unreachable.
#[instrument(skip(state))]
pub async fn ready(State(state): State<AppState>) -> StatusCode {
    match state.api().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, backend = %state.config().api.origin(), "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
