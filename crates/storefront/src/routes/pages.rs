//! Markdown content pages (about, gem knowledge, and friends).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::NaiveDate;
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::middleware::CspNonce;
use crate::models::Nav;
use crate::services::auth::AuthContext;
use crate::state::AppState;

/// Content page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/show.html")]
pub struct ContentPageTemplate {
    pub nav: Nav,
    pub title: String,
    pub description: String,
    pub updated_at: Option<NaiveDate>,
    pub content_html: String,
}

fn render_page(
    state: &AppState,
    auth: &AuthContext,
    nonce: &CspNonce,
    slug: &str,
) -> Result<ContentPageTemplate, AppError> {
    let page = state
        .content()
        .get_page(slug)
        .ok_or_else(|| AppError::NotFound(format!("page {slug}")))?;

    Ok(ContentPageTemplate {
        nav: Nav::new(auth, nonce),
        title: page.meta.title.clone(),
        description: page.meta.description.clone().unwrap_or_default(),
        updated_at: page.meta.updated_at,
        content_html: page.content_html.clone(),
    })
}

/// Display the About page.
///
/// # Errors
///
/// Returns 404 if the page doesn't exist.
#[instrument(skip(state, auth, nonce))]
pub async fn about(
    State(state): State<AppState>,
    auth: AuthContext,
    nonce: CspNonce,
) -> Result<impl IntoResponse, AppError> {
    render_page(&state, &auth, &nonce, "about")
}

/// Display the gem knowledge guide.
///
/// # Errors
///
/// Returns 404 if the page doesn't exist.
#[instrument(skip(state, auth, nonce))]
pub async fn gem_knowledge(
    State(state): State<AppState>,
    auth: AuthContext,
    nonce: CspNonce,
) -> Result<impl IntoResponse, AppError> {
    render_page(&state, &auth, &nonce, "gem-knowledge")
}

/// Display any content page by slug.
///
/// # Errors
///
/// Returns 404 if the page doesn't exist.
#[instrument(skip(state, auth, nonce))]
pub async fn show(
    State(state): State<AppState>,
    auth: AuthContext,
    nonce: CspNonce,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    render_page(&state, &auth, &nonce, &slug)
}
