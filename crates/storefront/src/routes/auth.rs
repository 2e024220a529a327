//! Sign-in, registration and sign-out.
//!
//! Credentials go straight to the inventory backend; on success the returned
//! user and access token are stored in the session by [`AuthContext::login`].

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Json, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::guard::can_access_inventory;
use gemvault_core::{Email, KycProfile, Registration, User, ValidationErrors};

use crate::api::ApiError;
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::CspNonce;
use crate::models::Nav;
use crate::services::auth::{AuthContext, SessionView};
use crate::state::AppState;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Registration form data, including the business (KYC) details.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub company_name: String,
    pub business_type: String,
    pub registration_number: String,
    pub country: String,
    pub phone: String,
    pub website: String,
}

/// Query parameters for the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub error: Option<&'static str>,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub nav: Nav,
    pub error: Option<String>,
    pub errors: ValidationErrors,
    pub form: RegisterForm,
}

/// Registration success page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register_success.html")]
pub struct RegisterSuccessTemplate {
    pub nav: Nav,
    pub email: String,
    pub message: Option<String>,
}

/// Shown in place of a protected page when nobody is signed in.
#[derive(Template, WebTemplate)]
#[template(path = "auth/prompt.html")]
pub struct LoginPromptTemplate {
    pub nav: Nav,
    /// Where to return after signing in.
    pub next: String,
}

impl LoginPromptTemplate {
    /// Login link that returns here afterwards.
    #[must_use]
    pub fn login_href(&self) -> String {
        format!("/auth/login?next={}", urlencoding::encode(&self.next))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Accept only same-site relative paths as a post-login destination.
#[must_use]
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();
    let ok = next.starts_with('/')
        && !next.starts_with("//")
        && !next.contains('\\')
        && !next.starts_with("/auth/");
    ok.then_some(next)
}

/// Default landing page for a freshly signed-in user.
fn landing_page(user: &User) -> &'static str {
    if user.is_admin() {
        "/admin/gems"
    } else if can_access_inventory(user.role, user.status) {
        "/inventory"
    } else {
        gemvault_core::guard::SUSPENDED_PATH
    }
}

fn login_error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "The email or password is incorrect.",
        "invalid_email" => "Please enter a valid email address.",
        "blocked" => "This account cannot sign in. Please contact us.",
        "rate_limited" => "Too many attempts. Please wait a moment and try again.",
        "session" => "We could not start your session. Please try again.",
        _ => "Sign-in is unavailable right now. Please try again shortly.",
    }
}

fn login_error_code(err: &ApiError) -> &'static str {
    match err {
        ApiError::Unauthorized | ApiError::NotFound(_) | ApiError::Api { status: 400, .. } => {
            "credentials"
        }
        ApiError::Forbidden(_) => "blocked",
        ApiError::RateLimited(_) => "rate_limited",
        _ => "unavailable",
    }
}

fn login_redirect(code: &str, next: Option<&str>) -> Response {
    let mut target = format!("/auth/login?error={code}");
    if let Some(next) = safe_next(next) {
        target.push_str("&next=");
        target.push_str(&urlencoding::encode(next));
    }
    Redirect::to(&target).into_response()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl RegisterForm {
    /// Check the form and build the backend body.
    ///
    /// # Errors
    ///
    /// Returns every invalid field at once.
    pub fn to_registration(&self) -> Result<Registration, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", "Name is required");
        }
        let email = match Email::parse(&self.email) {
            Ok(email) => Some(email),
            Err(e) => {
                errors.add("email", e.to_string());
                None
            }
        };
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
            );
        } else if self.password != self.password_confirm {
            errors.add("password_confirm", "Passwords do not match");
        }
        if self.company_name.trim().is_empty() {
            errors.add("company_name", "Company name is required");
        }
        if self.country.trim().is_empty() {
            errors.add("country", "Country is required");
        }

        errors.into_result()?;
        let Some(email) = email else {
            return Err(ValidationErrors::new());
        };

        Ok(Registration {
            name: self.name.trim().to_string(),
            email: email.as_str().to_string(),
            password: self.password.clone(),
            kyc: KycProfile {
                company_name: non_empty(&self.company_name),
                business_type: non_empty(&self.business_type),
                registration_number: non_empty(&self.registration_number),
                country: non_empty(&self.country),
                phone: non_empty(&self.phone),
                website: non_empty(&self.website),
            },
        })
    }

    /// Copy of the form safe to echo back (passwords dropped).
    fn without_passwords(self) -> Self {
        Self {
            password: String::new(),
            password_confirm: String::new(),
            ..self
        }
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    auth: AuthContext,
    nonce: CspNonce,
    Query(query): Query<LoginQuery>,
) -> Response {
    if let Some(user) = auth.user() {
        let target = safe_next(query.next.as_deref()).unwrap_or_else(|| landing_page(user));
        return Redirect::to(target).into_response();
    }

    LoginTemplate {
        nav: Nav::anonymous(&nonce),
        error: query.error.as_deref().map(login_error_message),
        next: safe_next(query.next.as_deref()).unwrap_or_default().to_string(),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    mut auth: AuthContext,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = form.next.as_deref();
    let Ok(email) = Email::parse(&form.email) else {
        return login_redirect("invalid_email", next);
    };

    let response = match state.api().login(&email, &form.password).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, email_domain = %email.domain(), "Login failed");
            return login_redirect(login_error_code(&e), next);
        }
    };

    let target = safe_next(next)
        .map_or_else(|| landing_page(&response.user).to_string(), String::from);

    if let Err(e) = auth.login(response.user, response.access_token).await {
        tracing::error!(error = %e, "Failed to store session after login");
        return login_redirect("session", next);
    }
    add_breadcrumb("auth", "Signed in", None);

    Redirect::to(&target).into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(auth: AuthContext, nonce: CspNonce) -> impl IntoResponse {
    RegisterTemplate {
        nav: Nav::new(&auth, &nonce),
        error: None,
        errors: ValidationErrors::new(),
        form: RegisterForm::default(),
    }
}

/// Handle registration form submission.
///
/// New accounts start out `PENDING`; the user is not signed in and is told
/// to wait for approval.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    nonce: CspNonce,
    Form(form): Form<RegisterForm>,
) -> Response {
    let registration = match form.to_registration() {
        Ok(registration) => registration,
        Err(errors) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                RegisterTemplate {
                    nav: Nav::anonymous(&nonce),
                    error: None,
                    errors,
                    form: form.without_passwords(),
                },
            )
                .into_response();
        }
    };

    match state.api().register(&registration).await {
        Ok(message) => {
            tracing::info!(company = ?registration.kyc.company_name, "Registration submitted");
            RegisterSuccessTemplate {
                nav: Nav::anonymous(&nonce),
                email: registration.email,
                message,
            }
            .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Registration failed");
            let status = match &e {
                ApiError::Api { status, .. } if (400..500).contains(status) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                _ => StatusCode::BAD_GATEWAY,
            };
            (
                status,
                RegisterTemplate {
                    nav: Nav::anonymous(&nonce),
                    error: Some(e.user_message()),
                    errors: ValidationErrors::new(),
                    form: form.without_passwords(),
                },
            )
                .into_response()
        }
    }
}

// =============================================================================
// Logout & Session
// =============================================================================

/// Handle logout.
///
/// # Errors
///
/// Returns an error if the session cannot be cleared.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, auth: AuthContext) -> Result<Response, AppError> {
    let cookie = auth.logout(state.api()).await?;
    Ok((
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        Redirect::to("/"),
    )
        .into_response())
}

/// Current auth state as JSON.
pub async fn session(auth: AuthContext) -> Json<SessionView> {
    Json(SessionView::from(&auth))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> RegisterForm {
        RegisterForm {
            name: "Ana Duarte".to_string(),
            email: "ana@lapidary.example".to_string(),
            password: "correct horse".to_string(),
            password_confirm: "correct horse".to_string(),
            company_name: "Duarte Lapidary".to_string(),
            country: "PT".to_string(),
            website: "  ".to_string(),
            ..RegisterForm::default()
        }
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/inventory?page=2")), Some("/inventory?page=2"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("/auth/logout")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_registration_is_built_from_valid_form() {
        let registration = valid_form().to_registration();
        let Ok(registration) = registration else {
            panic!("form should be valid");
        };
        assert_eq!(registration.email, "ana@lapidary.example");
        assert_eq!(registration.kyc.company_name.as_deref(), Some("Duarte Lapidary"));
        assert_eq!(registration.kyc.website, None);
    }

    #[test]
    fn test_registration_reports_every_problem() {
        let form = RegisterForm {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            ..RegisterForm::default()
        };
        let Err(errors) = form.to_registration() else {
            panic!("form should be invalid");
        };
        for field in ["name", "email", "password", "company_name", "country"] {
            assert!(errors.message_for(field).is_some(), "missing error for {field}");
        }
    }

    #[test]
    fn test_password_mismatch() {
        let form = RegisterForm {
            password_confirm: "different horse".to_string(),
            ..valid_form()
        };
        let Err(errors) = form.to_registration() else {
            panic!("form should be invalid");
        };
        assert!(errors.message_for("password_confirm").is_some());
    }

    #[test]
    fn test_login_error_mapping() {
        assert_eq!(login_error_code(&ApiError::Unauthorized), "credentials");
        assert_eq!(login_error_code(&ApiError::RateLimited(30)), "rate_limited");
        assert_eq!(
            login_error_code(&ApiError::Forbidden("suspended".to_string())),
            "blocked"
        );
        assert_eq!(login_error_message("nope"), login_error_message("unavailable"));
    }
}
