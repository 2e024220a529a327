//! Route guard extractors.
//!
//! Each extractor loads the [`AuthContext`] and runs a fresh
//! [`Guard`] against it. Visitors who are not signed in get the sign-in
//! prompt (401); signed-in users who may not enter are redirected.
//!
//! ```rust,ignore
//! async fn inventory(RequireInventoryAccess(auth): RequireInventoryAccess) -> impl IntoResponse {
//!     format!("Hello, {}!", auth.user().map_or("guest", |u| u.display_name()))
//! }
//! ```

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};

use gemvault_core::guard::{Guard, GuardEffect, GuardKind};

use super::csp::CspNonce;
use crate::error::AppError;
use crate::models::Nav;
use crate::routes::auth::LoginPromptTemplate;
use crate::services::auth::AuthContext;
use crate::state::AppState;

/// Any signed-in user, whatever their status.
pub struct RequireAuth(pub AuthContext);

/// Admins, or users whose status grants inventory access.
pub struct RequireInventoryAccess(pub AuthContext);

/// Admins only.
pub struct RequireAdmin(pub AuthContext);

/// Why a guarded request was turned away.
#[derive(Debug)]
pub enum GuardRejection {
    /// Not signed in; show the sign-in / register prompt.
    Prompt { nonce: CspNonce, next: String },
    /// Signed in but not allowed here.
    Redirect(&'static str),
    /// Loading the session failed.
    Failed(AppError),
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Prompt { nonce, next } => (
                StatusCode::UNAUTHORIZED,
                LoginPromptTemplate {
                    nav: Nav::anonymous(&nonce),
                    next,
                },
            )
                .into_response(),
            Self::Redirect(target) => Redirect::to(target).into_response(),
            Self::Failed(err) => err.into_response(),
        }
    }
}

/// Decide whether the request may proceed.
///
/// `kind` is `None` for pages that only need a signed-in user.
async fn run_guard(
    parts: &mut Parts,
    state: &AppState,
    kind: Option<GuardKind>,
) -> Result<AuthContext, GuardRejection> {
    let auth = AuthContext::from_request_parts(parts, state)
        .await
        .map_err(GuardRejection::Failed)?;

    let effect = match kind {
        Some(kind) => Guard::new(kind).transition(auth.snapshot()),
        None if auth.is_authenticated() => Some(GuardEffect::Render),
        None => Some(GuardEffect::PromptLogin),
    };

    match effect {
        Some(GuardEffect::Render) => Ok(auth),
        Some(GuardEffect::PromptLogin) => {
            let nonce = parts
                .extensions
                .get::<CspNonce>()
                .cloned()
                .unwrap_or_else(CspNonce::generate);
            Err(GuardRejection::Prompt {
                nonce,
                next: original_path(parts),
            })
        }
        Some(GuardEffect::Redirect(target)) => {
            tracing::info!(
                user_id = ?auth.user().map(|u| u.id.to_string()),
                redirect_to = target,
                path = %parts.uri.path(),
                "Guard redirected signed-in user"
            );
            Err(GuardRejection::Redirect(target))
        }
        None => Err(GuardRejection::Failed(AppError::Internal(
            "guard did not resolve".to_string(),
        ))),
    }
}

/// Path and query the visitor asked for, before any nesting strips a prefix.
fn original_path(parts: &Parts) -> String {
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0);
    uri.path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string)
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        run_guard(parts, state, None).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireInventoryAccess {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        run_guard(parts, state, Some(GuardKind::Inventory))
            .await
            .map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        run_guard(parts, state, Some(GuardKind::Admin))
            .await
            .map(Self)
    }
}
