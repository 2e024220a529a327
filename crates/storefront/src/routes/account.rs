//! Account route handlers.
//!
//! `/account` and `/account/refresh` require a signed-in user of any status;
//! `/account/suspended` is public so the inventory guard can send people there.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::{Quotation, User, UserStatus};

use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, RequireAuth};
use crate::models::Nav;
use crate::services::auth::{AuthContext, RefreshMode};
use crate::state::AppState;

/// Flash-style messages passed through the query string.
#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub nav: Nav,
    pub user: User,
    pub kyc: Vec<(&'static str, String)>,
    pub quotations: Vec<Quotation>,
    pub notice: Option<&'static str>,
    pub error: Option<String>,
}

/// Explanation shown to users without inventory access.
#[derive(Template, WebTemplate)]
#[template(path = "account/suspended.html")]
pub struct SuspendedTemplate {
    pub nav: Nav,
    pub status: Option<UserStatus>,
    pub explanation: &'static str,
}

fn notice_message(code: &str) -> Option<&'static str> {
    match code {
        "refreshed" => Some("Your profile is up to date."),
        "quotation" => Some("Thanks! Your quotation request has been sent."),
        _ => None,
    }
}

/// Why a given status cannot browse the inventory.
#[must_use]
pub const fn status_explanation(status: Option<UserStatus>) -> &'static str {
    match status {
        Some(UserStatus::Pending) => {
            "Your registration is being reviewed. We will email you once your business details are approved."
        }
        Some(UserStatus::Suspended) => {
            "Your account has been suspended. Please contact us if you think this is a mistake."
        }
        Some(UserStatus::Rejected) => {
            "We were unable to approve your registration. Please contact us for details."
        }
        Some(UserStatus::Active | UserStatus::Approved) => {
            "Your account is in good standing. Try refreshing your profile."
        }
        None => "Sign in with an approved trade account to browse the inventory.",
    }
}

/// Display account overview page.
///
/// # Errors
///
/// Returns 401 if the session has no user.
///
/// Quotation history comes from `/api/quotations/mine`; when that fails the
/// copy embedded in the cached profile is shown instead.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    nonce: CspNonce,
    Query(query): Query<NoticeQuery>,
) -> Result<AccountIndexTemplate, AppError> {
    let nav = Nav::new(&auth, &nonce);
    let Some(user) = auth.user().cloned() else {
        return Err(AppError::Unauthorized("not signed in".to_string()));
    };

    let quotations = match auth.token() {
        Some(token) => match state.api().my_quotations(token).await {
            Ok(quotations) => quotations,
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to cached quotation history");
                user.quotations.clone()
            }
        },
        None => user.quotations.clone(),
    };

    let kyc = user
        .kyc
        .as_ref()
        .map(|kyc| {
            kyc.entries()
                .into_iter()
                .map(|(label, value)| (label, value.to_string()))
                .collect()
        })
        .unwrap_or_default();

    Ok(AccountIndexTemplate {
        nav,
        kyc,
        quotations,
        notice: query.notice.as_deref().and_then(notice_message),
        error: query.error,
        user,
    })
}

/// Re-fetch the profile on request.
///
/// A failure keeps the cached profile and shows the reason.
#[instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, RequireAuth(mut auth): RequireAuth) -> Redirect {
    match auth.refresh_user(state.api(), RefreshMode::Manual).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, status = %user.status, "Profile refreshed");
            Redirect::to("/account?notice=refreshed")
        }
        Err(e) => {
            let message = e.user_message();
            Redirect::to(&format!("/account?error={}", urlencoding::encode(&message)))
        }
    }
}

/// Display the no-access explanation.
pub async fn suspended(auth: AuthContext, nonce: CspNonce) -> impl IntoResponse {
    let status = auth.user().map(|u| u.status);
    SuspendedTemplate {
        nav: Nav::new(&auth, &nonce),
        status,
        explanation: status_explanation(status),
    }
}
