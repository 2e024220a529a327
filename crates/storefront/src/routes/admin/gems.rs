//! Staff gem management: table, CSV export, create/edit/delete, asset uploads.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Path, Query, RawQuery, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tracing::instrument;

use gemvault_core::query::{GemQuery, PAGE_SIZES};
use gemvault_core::{Gem, GemId, GemInput, ValidationErrors};

use super::{AdminNotice, with_error};
use crate::api::{ApiError, AssetKind, UploadBatch, UploadFile};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, RequireAdmin};
use crate::models::Nav;
use crate::routes::inventory::{TableView, query_href};
use crate::services::auth::AuthContext;
use crate::services::export::gems_to_csv;
use crate::state::AppState;

/// Path of the staff gem table.
pub const ADMIN_GEMS_PATH: &str = "/admin/gems";

/// Upper bound on pages fetched for one CSV export.
const MAX_EXPORT_PAGES: u32 = 100;

/// Multipart body limit for asset uploads: a full batch plus form overhead.
pub const UPLOAD_BODY_LIMIT: usize =
    crate::api::uploads::MAX_FILES_PER_BATCH * crate::api::uploads::MAX_FILE_BYTES + 1024 * 1024;

// =============================================================================
// Form Types
// =============================================================================

/// Gem form as submitted. Numbers arrive as text; asset lists are one URL
/// per line.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GemForm {
    pub stock_id: String,
    pub stone_type: String,
    pub color: String,
    pub shape: String,
    pub carat: String,
    pub clarity: String,
    pub origin: String,
    pub treatment: String,
    pub certificate: String,
    pub measurements: String,
    pub price: String,
    /// Checkbox: present (`"on"`) when available.
    pub availability: Option<String>,
    pub images: String,
    pub videos: String,
    pub certificates: String,
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn url_lines(value: &str) -> Vec<String> {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

impl GemForm {
    /// Parse and validate, reporting every field problem at once.
    ///
    /// # Errors
    ///
    /// Returns the collected [`ValidationErrors`].
    pub fn to_input(&self) -> Result<GemInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let carat = match self.carat.trim().parse::<f64>() {
            Ok(carat) => carat,
            Err(_) => {
                errors.add("carat", "Carat must be a number");
                f64::NAN
            }
        };
        let price = match optional(&self.price).map(|p| p.replace(',', "").parse::<f64>()) {
            None => None,
            Some(Ok(price)) => Some(price),
            Some(Err(_)) => {
                errors.add("price", "Price must be a number");
                None
            }
        };

        let input = GemInput {
            stock_id: self.stock_id.trim().to_string(),
            stone_type: self.stone_type.trim().to_string(),
            color: self.color.trim().to_string(),
            shape: self.shape.trim().to_string(),
            carat,
            clarity: optional(&self.clarity),
            origin: optional(&self.origin),
            treatment: optional(&self.treatment),
            certificate: optional(&self.certificate),
            measurements: optional(&self.measurements),
            price,
            availability: self.availability.is_some(),
            images: url_lines(&self.images),
            videos: url_lines(&self.videos),
            certificates: url_lines(&self.certificates),
        };

        if let Err(more) = input.validate() {
            for e in more.iter() {
                // A carat that failed to parse is already reported.
                if errors.message_for(e.field).is_none() {
                    errors.add(e.field, e.message.clone());
                }
            }
        }
        errors.into_result().map(|()| input)
    }

    /// Pre-fill from an existing gem.
    #[must_use]
    pub fn from_gem(gem: &Gem) -> Self {
        let input = GemInput::from_gem(gem);
        Self {
            stock_id: input.stock_id,
            stone_type: input.stone_type,
            color: input.color,
            shape: input.shape,
            carat: input.carat.to_string(),
            clarity: input.clarity.unwrap_or_default(),
            origin: input.origin.unwrap_or_default(),
            treatment: input.treatment.unwrap_or_default(),
            certificate: input.certificate.unwrap_or_default(),
            measurements: input.measurements.unwrap_or_default(),
            price: input.price.map(|p| p.to_string()).unwrap_or_default(),
            availability: input.availability.then(|| "on".to_string()),
            images: input.images.join("\n"),
            videos: input.videos.join("\n"),
            certificates: input.certificates.join("\n"),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Staff gem table.
#[derive(Template, WebTemplate)]
#[template(path = "admin/gems/index.html")]
pub struct AdminGemsTemplate {
    pub nav: Nav,
    pub table: TableView,
    pub export_href: String,
    pub notice: Option<&'static str>,
    pub error: Option<String>,
}

/// Create / edit form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/gems/form.html")]
pub struct GemFormTemplate {
    pub nav: Nav,
    pub title: String,
    /// Where the form posts to.
    pub action: String,
    pub form: GemForm,
    pub errors: ValidationErrors,
    pub error: Option<String>,
    /// The gem being edited (assets and upload form are shown for it).
    pub gem: Option<Gem>,
    pub notice: Option<&'static str>,
}

impl GemFormTemplate {
    fn create(nav: Nav, form: GemForm) -> Self {
        Self {
            nav,
            title: "New gem".to_string(),
            action: ADMIN_GEMS_PATH.to_string(),
            form,
            errors: ValidationErrors::new(),
            error: None,
            gem: None,
            notice: None,
        }
    }

    fn edit(nav: Nav, gem: Gem, form: GemForm) -> Self {
        Self {
            nav,
            title: format!("Edit {}", gem.stock_id),
            action: format!("{ADMIN_GEMS_PATH}/{}", gem.id),
            form,
            errors: ValidationErrors::new(),
            error: None,
            gem: Some(gem),
            notice: None,
        }
    }
}

fn parse_query(raw: Option<&str>) -> GemQuery {
    GemQuery::from_pairs(url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()))
}

fn edit_path(id: &str) -> String {
    format!("{ADMIN_GEMS_PATH}/{id}/edit")
}

fn admin_token(auth: &AuthContext) -> Result<&SecretString, AppError> {
    auth.token()
        .ok_or_else(|| AppError::Unauthorized("missing access token".to_string()))
}

// =============================================================================
// Table & Export
// =============================================================================

/// Display the staff gem table.
///
/// # Errors
///
/// Never fails on backend errors; those are shown as a banner.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(auth): RequireAdmin,
    nonce: CspNonce,
    RawQuery(raw): RawQuery,
    Query(notice): Query<AdminNotice>,
) -> Result<AdminGemsTemplate, AppError> {
    let query = parse_query(raw.as_deref());
    let result = state.api().list_gems(auth.token(), &query).await;
    if let Err(e) = &result {
        tracing::warn!(error = %e, "Admin gem list failed");
    }

    Ok(AdminGemsTemplate {
        nav: Nav::new(&auth, &nonce),
        export_href: query_href(&format!("{ADMIN_GEMS_PATH}/export.csv"), &query),
        table: TableView::new(ADMIN_GEMS_PATH, &query, result),
        notice: notice.message(),
        error: notice.error,
    })
}

/// Download every gem matching the current filters as CSV.
///
/// # Errors
///
/// Returns an error if any page fetch fails.
#[instrument(skip_all)]
pub async fn export_csv(
    State(state): State<AppState>,
    RequireAdmin(auth): RequireAdmin,
    RawQuery(raw): RawQuery,
) -> Result<Response, AppError> {
    let mut query = parse_query(raw.as_deref());
    query.update_page_size(PAGE_SIZES.iter().copied().max().unwrap_or(query.page_size));

    let mut gems = Vec::new();
    loop {
        let page = state.api().list_gems(auth.token(), &query).await?;
        gems.extend(page.gems);
        if !page.meta.has_next || query.page >= MAX_EXPORT_PAGES {
            break;
        }
        query.update_page(query.page + 1);
    }
    tracing::info!(rows = gems.len(), "Exported gems");

    let filename = format!("gems-{}.csv", chrono::Utc::now().format("%Y%m%d"));
    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        gems_to_csv(&gems),
    )
        .into_response())
}

// =============================================================================
// Create / Edit / Delete
// =============================================================================

/// Display the new-gem form.
pub async fn new_form(RequireAdmin(auth): RequireAdmin, nonce: CspNonce) -> impl IntoResponse {
    GemFormTemplate::create(
        Nav::new(&auth, &nonce),
        GemForm {
            availability: Some("on".to_string()),
            ..GemForm::default()
        },
    )
}

/// Create a gem.
///
/// # Errors
///
/// Returns 401 if the session has no access token.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(auth): RequireAdmin,
    nonce: CspNonce,
    Form(form): Form<GemForm>,
) -> Result<Response, AppError> {
    let token = admin_token(&auth)?;
    let nav = Nav::new(&auth, &nonce);

    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => {
            let mut page = GemFormTemplate::create(nav, form);
            page.errors = errors;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    match state.api().create_gem(token, &input).await {
        Ok(gem) => {
            tracing::info!(gem_id = %gem.id, "Gem created");
            add_breadcrumb("inventory", "Created gem", Some(&[("gem_id", gem.id.as_str())]));
            let target = format!("{}?notice=created", edit_path(gem.id.as_str()));
            Ok(Redirect::to(&target).into_response())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Gem create failed");
            let status = failure_status(&e);
            let mut page = GemFormTemplate::create(nav, form);
            page.error = Some(e.user_message());
            Ok((status, page).into_response())
        }
    }
}

/// Display the edit form for one gem.
///
/// # Errors
///
/// Returns 404 if the gem does not exist.
#[instrument(skip(state, auth, nonce, notice))]
pub async fn edit_form(
    State(state): State<AppState>,
    RequireAdmin(auth): RequireAdmin,
    nonce: CspNonce,
    Path(id): Path<String>,
    Query(notice): Query<AdminNotice>,
) -> Result<GemFormTemplate, AppError> {
    let gem = state.api().get_gem(auth.token(), &GemId::new(id)).await?;
    let form = GemForm::from_gem(&gem);
    let mut page = GemFormTemplate::edit(Nav::new(&auth, &nonce), gem, form);
    page.notice = notice.message();
    page.error = notice.error;
    Ok(page)
}

/// Save changes to a gem.
///
/// # Errors
///
/// Returns 404 if the gem does not exist.
#[instrument(skip(state, auth, nonce, form))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(auth): RequireAdmin,
    nonce: CspNonce,
    Path(id): Path<String>,
    Form(form): Form<GemForm>,
) -> Result<Response, AppError> {
    let token = admin_token(&auth)?;
    let gem_id = GemId::new(id);
    let nav = Nav::new(&auth, &nonce);

    let (status, errors, error) = match form.to_input() {
        Ok(input) => match state.api().update_gem(token, &gem_id, &input).await {
            Ok(gem) => {
                tracing::info!(gem_id = %gem.id, "Gem updated");
                add_breadcrumb("inventory", "Updated gem", Some(&[("gem_id", gem.id.as_str())]));
                return Ok(
                    Redirect::to(&format!("{}?notice=updated", edit_path(gem_id.as_str())))
                        .into_response(),
                );
            }
            Err(e @ ApiError::NotFound(_)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Gem update failed");
                (failure_status(&e), ValidationErrors::new(), Some(e.user_message()))
            }
        },
        Err(errors) => (StatusCode::UNPROCESSABLE_ENTITY, errors, None),
    };

    let gem = state.api().get_gem(Some(token), &gem_id).await?;
    let mut page = GemFormTemplate::edit(nav, gem, form);
    page.errors = errors;
    page.error = error;
    Ok((status, page).into_response())
}

/// Delete a gem.
///
/// # Errors
///
/// Returns 401 if the session has no access token.
#[instrument(skip(state, auth))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(auth): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let token = admin_token(&auth)?;
    let gem_id = GemId::new(id);

    match state.api().delete_gem(token, &gem_id).await {
        Ok(()) => {
            tracing::info!(gem_id = %gem_id, "Gem deleted");
            add_breadcrumb("inventory", "Deleted gem", Some(&[("gem_id", gem_id.as_str())]));
            Ok(Redirect::to(&format!("{ADMIN_GEMS_PATH}?notice=deleted")))
        }
        Err(e) => {
            tracing::warn!(error = %e, gem_id = %gem_id, "Gem delete failed");
            Ok(Redirect::to(&with_error(ADMIN_GEMS_PATH, &e.user_message())))
        }
    }
}

fn failure_status(err: &ApiError) -> StatusCode {
    match err {
        ApiError::Api { status, .. } if (400..500).contains(status) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// Asset Uploads
// =============================================================================

/// Files and kind read from the upload form.
#[derive(Debug)]
struct UploadForm {
    kind: Option<String>,
    files: Vec<UploadFile>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm {
        kind: None,
        files: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("kind") => {
                form.kind = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?,
                );
            }
            Some("files") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                // Browsers send an empty, unnamed part when nothing was chosen.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.files.push(UploadFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Upload images, videos or certificates for a gem.
///
/// Size and count limits are enforced before anything is sent. Returned URLs
/// missing from the gem's asset list are appended to it.
///
/// # Errors
///
/// Returns 400 for a malformed multipart body and 404 for an unknown gem.
#[instrument(skip(state, auth, multipart))]
pub async fn upload_assets(
    State(state): State<AppState>,
    RequireAdmin(auth): RequireAdmin,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let token = admin_token(&auth)?;
    let gem_id = GemId::new(id);
    let back = edit_path(gem_id.as_str());

    let form = read_upload_form(multipart).await?;
    let kind = match form.kind.as_deref().unwrap_or("images").parse::<AssetKind>() {
        Ok(kind) => kind,
        Err(e) => return Ok(Redirect::to(&with_error(&back, &e.to_string()))),
    };
    let batch = match UploadBatch::encode(kind, form.files) {
        Ok(batch) => batch,
        Err(e) => {
            tracing::info!(error = %e, "Rejected upload before sending");
            return Ok(Redirect::to(&with_error(&back, &e.to_string())));
        }
    };

    let gem = state.api().get_gem(Some(token), &gem_id).await?;
    let urls = match state
        .api()
        .upload_assets(token, kind, &gem.stock_id, &batch)
        .await
    {
        Ok(urls) => urls,
        Err(e) => {
            tracing::warn!(error = %e, "Asset upload failed");
            return Ok(Redirect::to(&with_error(&back, &e.user_message())));
        }
    };

    let mut input = GemInput::from_gem(&gem);
    let list = match kind {
        AssetKind::Images => &mut input.images,
        AssetKind::Videos => &mut input.videos,
        AssetKind::Certificates => &mut input.certificates,
    };
    let before = list.len();
    for url in urls {
        if !list.contains(&url) {
            list.push(url);
        }
    }
    if list.len() > before
        && let Err(e) = state.api().update_gem(token, &gem_id, &input).await
    {
        tracing::warn!(error = %e, "Uploaded files could not be linked to the gem");
        return Ok(Redirect::to(&with_error(&back, &e.user_message())));
    }

    add_breadcrumb(
        "inventory",
        "Uploaded assets",
        Some(&[("gem_id", gem_id.as_str()), ("kind", kind.as_str())]),
    );
    Ok(Redirect::to(&format!("{back}?notice=uploaded")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn filled() -> GemForm {
        GemForm {
            stock_id: "RB-204".to_string(),
            stone_type: "Ruby".to_string(),
            color: "Pigeon blood".to_string(),
            shape: "Oval".to_string(),
            carat: "2.05".to_string(),
            price: "18,500".to_string(),
            availability: Some("on".to_string()),
            images: "https://cdn.example/rb-204-1.jpg\n\n  https://cdn.example/rb-204-2.jpg  ".to_string(),
            ..GemForm::default()
        }
    }

    #[test]
    fn test_form_parses_numbers_and_url_lines() {
        let input = filled().to_input().unwrap();
        assert!((input.carat - 2.05).abs() < f64::EPSILON);
        assert_eq!(input.price, Some(18_500.0));
        assert!(input.availability);
        assert_eq!(input.images.len(), 2);
        assert_eq!(input.clarity, None);
    }

    #[test]
    fn test_form_reports_unparsable_carat_once() {
        let form = GemForm {
            carat: "heavy".to_string(),
            price: "lots".to_string(),
            ..filled()
        };
        let errors = form.to_input().unwrap_err();
        assert_eq!(errors.message_for("carat"), Some("Carat must be a number"));
        assert_eq!(errors.iter().filter(|e| e.field == "carat").count(), 1);
        assert!(errors.message_for("price").is_some());
    }

    #[test]
    fn test_unchecked_availability() {
        let form = GemForm {
            availability: None,
            ..filled()
        };
        assert!(!form.to_input().unwrap().availability);
    }

    #[test]
    fn test_round_trip_from_gem_prefills_form() {
        let gem: Gem = serde_json::from_value(serde_json::json!({
            "_id": "g1",
            "stockId": "SP-9",
            "stoneType": "Sapphire",
            "color": "Blue",
            "shape": "Cushion",
            "carat": 3.1,
            "videos": ["https://cdn.example/sp-9.mp4"]
        }))
        .unwrap();
        let form = GemForm::from_gem(&gem);
        assert_eq!(form.carat, "3.1");
        assert_eq!(form.videos, "https://cdn.example/sp-9.mp4");
        assert_eq!(form.availability.as_deref(), Some("on"));
        assert!(form.to_input().is_ok());
    }
}
