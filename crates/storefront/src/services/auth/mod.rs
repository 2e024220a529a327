//! Session-backed authentication context.
//!
//! The signed-in user and the backend access token are kept in the
//! server-side session. [`AuthContext`] is loaded once per request and is
//! the only way handlers read or change that state.
//!
//! A cached profile older than `PROFILE_REFRESH_SECS` is revalidated against
//! `/profile` when the context is extracted. That automatic revalidation
//! signs the user out on failure; a refresh the user asked for does not.

mod error;

pub use error::AuthError;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use tower_sessions::Session;
use tower_sessions::cookie::{Cookie, SameSite, time::OffsetDateTime};

use gemvault_core::guard::AuthSnapshot;
use gemvault_core::{Role, User, UserStatus};

use crate::api::ApiClient;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::models::{ACCESS_TOKEN_COOKIE, session_keys as keys};
use crate::state::AppState;

/// Why a profile refresh is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// The user pressed "refresh"; a failure keeps the cached profile.
    Manual,
    /// Revalidation of a stale or missing profile; a failure signs out.
    Initial,
}

/// Authentication state for the current request.
#[derive(Clone)]
pub struct AuthContext {
    session: Session,
    user: Option<User>,
    token: Option<SecretString>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl AuthContext {
    /// Read the cached user and token from the session.
    ///
    /// Unreadable entries are treated as signed out.
    pub async fn load(session: Session) -> Self {
        let user = session.get::<User>(keys::USER).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unreadable user in session");
            None
        });

        let mut token = session
            .get::<String>(keys::ACCESS_TOKEN)
            .await
            .ok()
            .flatten();
        if token.is_none() {
            token = session.get::<String>(keys::AUTH_TOKEN).await.ok().flatten();
        }

        let refreshed_at = session
            .get::<DateTime<Utc>>(keys::USER_REFRESHED_AT)
            .await
            .ok()
            .flatten();

        Self {
            session,
            user,
            token: token.filter(|t| !t.is_empty()).map(SecretString::from),
            refreshed_at,
        }
    }

    /// The underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The backend access token, if any.
    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// Always `false`: the context is only handed out once loaded.
    #[must_use]
    pub const fn loading(&self) -> bool {
        false
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }

    #[must_use]
    pub fn has_status(&self, status: UserStatus) -> bool {
        self.user.as_ref().is_some_and(|u| u.status == status)
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.user.as_ref().is_some_and(|u| u.role == role)
    }

    /// What the route guards look at.
    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot::resolved(self.user.as_ref())
    }

    /// Whether the cached profile should be revalidated before use.
    #[must_use]
    pub fn needs_revalidation(&self, ttl: std::time::Duration) -> bool {
        self.token.is_some() && (self.user.is_none() || is_stale(self.refreshed_at, Utc::now(), ttl))
    }

    /// Store a freshly signed-in user.
    ///
    /// The session id is cycled to prevent fixation.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn login(&mut self, user: User, access_token: String) -> Result<(), AuthError> {
        self.session.cycle_id().await?;

        let now = Utc::now();
        self.session.insert(keys::USER, &user).await?;
        self.session.insert(keys::ACCESS_TOKEN, &access_token).await?;
        self.session.insert(keys::AUTH_TOKEN, &access_token).await?;
        self.session.insert(keys::USER_REFRESHED_AT, now).await?;

        set_sentry_user(&user.id, Some(&user.email));
        tracing::info!(user_id = %user.id, role = %user.role, status = %user.status, "User signed in");

        self.user = Some(user);
        self.token = Some(SecretString::from(access_token));
        self.refreshed_at = Some(now);
        Ok(())
    }

    /// Sign out: tell the backend, then wipe every trace of the user locally.
    ///
    /// Backend errors are logged and ignored so a dead backend cannot trap a
    /// user in a signed-in session. Returns a cookie that expires the legacy
    /// `accessToken` cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be cleared.
    pub async fn logout(mut self, api: &ApiClient) -> Result<Cookie<'static>, AuthError> {
        if let Some(token) = &self.token
            && let Err(e) = api.logout(token).await
        {
            tracing::warn!(error = %e, "Backend logout failed; clearing local session anyway");
        }

        if let Some(user) = &self.user {
            tracing::info!(user_id = %user.id, "User signed out");
        }
        self.clear().await?;
        Ok(expired_token_cookie())
    }

    /// Re-fetch the profile from the backend.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] without a token, or
    /// [`AuthError::Refresh`] when the backend call fails. In
    /// [`RefreshMode::Manual`] the cached user is kept; in
    /// [`RefreshMode::Initial`] the session is cleared first.
    pub async fn refresh_user(
        &mut self,
        api: &ApiClient,
        mode: RefreshMode,
    ) -> Result<&User, AuthError> {
        let Some(token) = self.token.clone() else {
            return Err(AuthError::NotAuthenticated);
        };

        match api.profile(&token).await {
            Ok(user) => {
                let now = Utc::now();
                self.session.insert(keys::USER, &user).await?;
                self.session.insert(keys::USER_REFRESHED_AT, now).await?;
                self.refreshed_at = Some(now);
                Ok(self.user.insert(user))
            }
            Err(e) => {
                match mode {
                    RefreshMode::Manual => {
                        tracing::warn!(error = %e, "Manual profile refresh failed; keeping cached profile");
                    }
                    RefreshMode::Initial => {
                        tracing::info!(error = %e, "Profile revalidation failed; signing out");
                        self.clear().await?;
                    }
                }
                Err(AuthError::Refresh(e))
            }
        }
    }

    /// Remove every auth key and destroy the session.
    async fn clear(&mut self) -> Result<(), AuthError> {
        for key in keys::AUTH_KEYS {
            self.session.remove_value(key).await?;
        }
        self.session.flush().await?;
        clear_sentry_user();

        self.user = None;
        self.token = None;
        self.refreshed_at = None;
        Ok(())
    }
}

/// Whether a profile fetched at `refreshed_at` is older than `ttl`.
fn is_stale(refreshed_at: Option<DateTime<Utc>>, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
    let Some(refreshed_at) = refreshed_at else {
        return true;
    };
    chrono::Duration::from_std(ttl).is_ok_and(|ttl| now - refreshed_at >= ttl)
}

/// `Set-Cookie` value that deletes the legacy `accessToken` cookie.
#[must_use]
pub fn expired_token_cookie() -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(tower_sessions::cookie::time::Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer not installed".to_string()))?;

        let mut auth = Self::load(session).await;
        if auth.needs_revalidation(state.config().profile_refresh)
            && let Err(e) = auth.refresh_user(state.api(), RefreshMode::Initial).await
        {
            tracing::debug!(error = %e, "Continuing as signed out");
        }
        Ok(auth)
    }
}

// =============================================================================
// JSON view
// =============================================================================

/// Body of `GET /api/session`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user: Option<User>,
    pub loading: bool,
    pub is_authenticated: bool,
    pub is_admin: bool,
}

impl From<&AuthContext> for SessionView {
    fn from(auth: &AuthContext) -> Self {
        Self {
            user: auth.user.clone(),
            loading: auth.loading(),
            is_authenticated: auth.is_authenticated(),
            is_admin: auth.is_admin(),
        }
    }
}
