//! Quotation (price inquiry) submission.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::{Gem, GemId, QuotationInput, ValidationErrors};

use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, RequireInventoryAccess};
use crate::models::Nav;
use crate::services::auth::AuthContext;
use crate::state::AppState;

/// `?gem=<id>` on the new-quotation page.
#[derive(Debug, Deserialize)]
pub struct NewQuotationQuery {
    pub gem: Option<String>,
}

/// Quotation form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QuotationForm {
    pub gem_id: String,
    pub message: String,
    pub quantity: String,
}

impl QuotationForm {
    /// Build the backend body. A quantity that is not a number is reported
    /// as a field error rather than silently dropped.
    fn to_input(&self) -> Result<QuotationInput, ValidationErrors> {
        let quantity = match self.quantity.trim() {
            "" => None,
            raw => match raw.parse::<u32>() {
                Ok(q) => Some(q),
                Err(_) => {
                    let mut errors = ValidationErrors::new();
                    errors.add("quantity", "Quantity must be a whole number");
                    return Err(errors);
                }
            },
        };
        let gem_id = self.gem_id.trim();
        let input = QuotationInput {
            gem_id: (!gem_id.is_empty()).then(|| GemId::new(gem_id)),
            message: self.message.trim().to_string(),
            quantity,
        };
        input.validate()?;
        Ok(input)
    }
}

/// Quotation request page.
#[derive(Template, WebTemplate)]
#[template(path = "quotations/new.html")]
pub struct NewQuotationTemplate {
    pub nav: Nav,
    pub gem: Option<Gem>,
    pub form: QuotationForm,
    pub errors: ValidationErrors,
    pub error: Option<String>,
}

/// Look up the gem a quotation is about; unknown ids are dropped.
async fn gem_for(state: &AppState, auth: &AuthContext, id: &str) -> Option<Gem> {
    if id.trim().is_empty() {
        return None;
    }
    match state.api().get_gem(auth.token(), &GemId::new(id.trim())).await {
        Ok(gem) => Some(gem),
        Err(e) => {
            tracing::warn!(error = %e, gem_id = id, "Quotation references an unavailable gem");
            None
        }
    }
}

/// Display the quotation form, optionally about one gem.
#[instrument(skip(state, auth, nonce))]
pub async fn new_form(
    State(state): State<AppState>,
    RequireInventoryAccess(auth): RequireInventoryAccess,
    nonce: CspNonce,
    Query(query): Query<NewQuotationQuery>,
) -> impl IntoResponse {
    let gem = match query.gem.as_deref() {
        Some(id) => gem_for(&state, &auth, id).await,
        None => None,
    };

    NewQuotationTemplate {
        nav: Nav::new(&auth, &nonce),
        form: QuotationForm {
            gem_id: gem.as_ref().map(|g| g.id.to_string()).unwrap_or_default(),
            ..QuotationForm::default()
        },
        gem,
        errors: ValidationErrors::new(),
        error: None,
    }
}

/// Submit a quotation.
///
/// # Errors
///
/// Returns 401 if the session has no access token.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireInventoryAccess(auth): RequireInventoryAccess,
    nonce: CspNonce,
    Form(form): Form<QuotationForm>,
) -> Result<Response, AppError> {
    let token = auth
        .token()
        .ok_or_else(|| AppError::Unauthorized("missing access token".to_string()))?;

    let (status, errors, error) = match form.to_input() {
        Ok(input) => match state.api().create_quotation(token, &input).await {
            Ok(quotation) => {
                tracing::info!(quotation_id = %quotation.id, "Quotation submitted");
                add_breadcrumb("quotation", "Submitted quotation", None);
                return Ok(Redirect::to("/account?notice=quotation").into_response());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Quotation submission failed");
                (StatusCode::BAD_GATEWAY, ValidationErrors::new(), Some(e.user_message()))
            }
        },
        Err(errors) => (StatusCode::UNPROCESSABLE_ENTITY, errors, None),
    };

    let gem = gem_for(&state, &auth, &form.gem_id).await;
    Ok((
        status,
        NewQuotationTemplate {
            nav: Nav::new(&auth, &nonce),
            gem,
            form,
            errors,
            error,
        },
    )
        .into_response())
}
