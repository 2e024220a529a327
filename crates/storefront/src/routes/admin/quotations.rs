//! Staff review of quotation requests.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::{Quotation, QuotationDecision, QuotationId, QuotationStatus};

use super::{AdminNotice, with_error};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, RequireAdmin};
use crate::models::Nav;
use crate::state::AppState;

/// Path of the staff quotation list.
pub const ADMIN_QUOTATIONS_PATH: &str = "/admin/quotations";

/// `?status=` filter on the list page.
#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

/// Decision form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DecisionForm {
    pub status: String,
    pub quoted_price: String,
    pub admin_note: String,
}

impl DecisionForm {
    fn to_decision(&self) -> Result<QuotationDecision, String> {
        let status = self
            .status
            .parse::<QuotationStatus>()
            .map_err(|_| format!("Unknown status: {}", self.status))?;
        let quoted_price = match self.quoted_price.trim().replace(',', "") {
            p if p.is_empty() => None,
            p => Some(
                p.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .ok_or_else(|| "Quoted price must be a positive number".to_string())?,
            ),
        };
        if status == QuotationStatus::Approved && quoted_price.is_none() {
            return Err("Approving a quotation needs a quoted price".to_string());
        }
        let note = self.admin_note.trim();
        Ok(QuotationDecision {
            status,
            quoted_price,
            admin_note: (!note.is_empty()).then(|| note.to_string()),
        })
    }
}

/// One tab of the status filter.
#[derive(Debug, Clone)]
pub struct StatusTab {
    pub label: &'static str,
    pub href: String,
    pub current: bool,
}

/// Staff quotation list.
#[derive(Template, WebTemplate)]
#[template(path = "admin/quotations/index.html")]
pub struct AdminQuotationsTemplate {
    pub nav: Nav,
    pub quotations: Vec<Quotation>,
    pub tabs: Vec<StatusTab>,
    pub notice: Option<&'static str>,
    pub error: Option<String>,
}

fn status_tabs(selected: Option<QuotationStatus>) -> Vec<StatusTab> {
    let all = StatusTab {
        label: "All",
        href: ADMIN_QUOTATIONS_PATH.to_string(),
        current: selected.is_none(),
    };
    std::iter::once(all)
        .chain(
            [
                (QuotationStatus::Pending, "Pending"),
                (QuotationStatus::Approved, "Approved"),
                (QuotationStatus::Rejected, "Rejected"),
            ]
            .into_iter()
            .map(|(status, label)| StatusTab {
                label,
                href: format!("{ADMIN_QUOTATIONS_PATH}?status={status}"),
                current: selected == Some(status),
            }),
        )
        .collect()
}

/// List quotations, optionally by status.
///
/// # Errors
///
/// Returns 401 if the session has no access token.
#[instrument(skip(state, auth, nonce, notice))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(auth): RequireAdmin,
    nonce: CspNonce,
    Query(filter): Query<StatusFilter>,
    Query(notice): Query<AdminNotice>,
) -> Result<AdminQuotationsTemplate, AppError> {
    let token = auth
        .token()
        .ok_or_else(|| AppError::Unauthorized("missing access token".to_string()))?;
    let status = filter
        .status
        .as_deref()
        .and_then(|s| s.parse::<QuotationStatus>().ok());

    let (quotations, error) = match state.api().all_quotations(token, status).await {
        Ok(quotations) => (quotations, notice.error.clone()),
        Err(e) => {
            tracing::warn!(error = %e, "Quotation list failed");
            (Vec::new(), Some(e.user_message()))
        }
    };

    Ok(AdminQuotationsTemplate {
        nav: Nav::new(&auth, &nonce),
        quotations,
        tabs: status_tabs(status),
        notice: notice.message(),
        error,
    })
}

/// Record a decision and return to the list.
///
/// # Errors
///
/// Returns 401 if the session has no access token.
#[instrument(skip(state, auth, form))]
pub async fn decide(
    State(state): State<AppState>,
    RequireAdmin(auth): RequireAdmin,
    Path(id): Path<String>,
    Form(form): Form<DecisionForm>,
) -> Result<Redirect, AppError> {
    let token = auth
        .token()
        .ok_or_else(|| AppError::Unauthorized("missing access token".to_string()))?;

    let decision = match form.to_decision() {
        Ok(decision) => decision,
        Err(message) => return Ok(Redirect::to(&with_error(ADMIN_QUOTATIONS_PATH, &message))),
    };

    let id = QuotationId::new(id);
    match state.api().decide_quotation(token, &id, &decision).await {
        Ok(quotation) => {
            tracing::info!(quotation_id = %quotation.id, status = %quotation.status, "Quotation decided");
            add_breadcrumb("quotation", "Decided quotation", Some(&[("quotation_id", id.as_str())]));
            Ok(Redirect::to(&format!("{ADMIN_QUOTATIONS_PATH}?notice=decided")))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Quotation decision failed");
            Ok(Redirect::to(&with_error(ADMIN_QUOTATIONS_PATH, &e.user_message())))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_parsing() {
        let form = DecisionForm {
            status: "APPROVED".to_string(),
            quoted_price: "12,750".to_string(),
            admin_note: "  Valid 14 days ".to_string(),
        };
        let decision = form.to_decision().unwrap();
        assert_eq!(decision.status, QuotationStatus::Approved);
        assert_eq!(decision.quoted_price, Some(12_750.0));
        assert_eq!(decision.admin_note.as_deref(), Some("Valid 14 days"));
    }

    #[test]
    fn test_approval_needs_price() {
        let form = DecisionForm {
            status: "APPROVED".to_string(),
            ..DecisionForm::default()
        };
        assert!(form.to_decision().is_err());

        let form = DecisionForm {
            status: "REJECTED".to_string(),
            ..DecisionForm::default()
        };
        assert_eq!(form.to_decision().unwrap().quoted_price, None);
    }

    #[test]
    fn test_status_tabs_mark_selection() {
        let tabs = status_tabs(Some(QuotationStatus::Pending));
        assert_eq!(tabs.len(), 4);
        assert!(tabs.iter().any(|t| t.current && t.label == "Pending"));
        assert!(tabs.iter().any(|t| t.href == "/admin/quotations?status=PENDING"));
    }
}
