//! Inventory browser.
//!
//! `/inventory` renders the full page from the URL (or, without parameters,
//! from the query saved in the session). `/inventory/table` applies a single
//! table action to the saved query and returns just the table; those fetches
//! go through the [`QueryController`](crate::services::inventory::QueryController)
//! so a slow, superseded response is answered with `204 No Content` instead
//! of overwriting the newer table.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use gemvault_core::query::{
    GemPage, GemQuery, PAGE_SIZES, PageMeta, QueryUpdate, SortDirection, SortField, param,
};
use gemvault_core::{FilterOptions, Gem, GemId};

use crate::api::ApiError;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, RequireInventoryAccess};
use crate::models::{Nav, session_keys};
use crate::services::inventory::Fetch;
use crate::state::AppState;

/// Path of the full inventory page.
pub const INVENTORY_PATH: &str = "/inventory";

/// How many page links to show either side of the current page.
const PAGE_WINDOW: u32 = 2;

// =============================================================================
// View Models
// =============================================================================

/// A link that works both as a plain `href` and as a partial table action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLink {
    pub label: String,
    /// Full page URL (no JavaScript, bookmarks, history).
    pub href: String,
    /// Query string for `/inventory/table`.
    pub action: String,
    pub current: bool,
}

/// A sortable column header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortColumn {
    pub label: &'static str,
    pub link: TableLink,
    pub aria_sort: &'static str,
    pub indicator: &'static str,
}

/// One checkbox in a filter group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChoice {
    pub value: String,
    pub checked: bool,
}

/// A multi-valued filter, rendered as a checkbox list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGroup {
    pub label: &'static str,
    pub param: &'static str,
    pub choices: Vec<FilterChoice>,
}

/// Everything the gem table partial needs.
#[derive(Debug, Clone)]
pub struct TableView {
    pub gems: Vec<Gem>,
    pub meta: PageMeta,
    pub search: String,
    pub active_filters: usize,
    /// Canonical URL of this exact table state.
    pub self_href: String,
    pub error: Option<String>,
    pub columns: Vec<SortColumn>,
    pub pages: Vec<TableLink>,
    pub prev: Option<TableLink>,
    pub next: Option<TableLink>,
    pub page_sizes: Vec<TableLink>,
    pub reset: TableLink,
}

/// The filter sidebar.
#[derive(Debug, Clone)]
pub struct FilterPanel {
    pub groups: Vec<FilterGroup>,
    pub carat_min: String,
    pub carat_max: String,
    /// `""`, `"true"` or `"false"`.
    pub availability: &'static str,
    pub search: String,
    /// Sort and page size, carried through the plain-HTML filter form.
    pub carried: Vec<(&'static str, String)>,
}

// =============================================================================
// Templates
// =============================================================================

/// Full inventory page.
#[derive(Template, WebTemplate)]
#[template(path = "inventory/index.html")]
pub struct InventoryTemplate {
    pub nav: Nav,
    pub table: TableView,
    pub panel: FilterPanel,
}

/// Table-only partial for `/inventory/table`.
#[derive(Template, WebTemplate)]
#[template(path = "inventory/table.html")]
pub struct TableTemplate {
    pub table: TableView,
}

/// Gem detail page.
#[derive(Template, WebTemplate)]
#[template(path = "inventory/show.html")]
pub struct GemTemplate {
    pub nav: Nav,
    pub gem: Gem,
    pub back_href: String,
}

// =============================================================================
// Query Helpers
// =============================================================================

/// `base?query` with repeated keys for multi-valued filters.
#[must_use]
pub fn query_href(base: &str, query: &GemQuery) -> String {
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.to_query_pairs())
        .finish();
    format!("{base}?{encoded}")
}

fn encode_action(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn parse_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|raw| {
        url::form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect()
    })
    .unwrap_or_default()
}

/// Link that applies `update` to `query`.
fn link(
    base: &str,
    query: &GemQuery,
    update: QueryUpdate,
    label: String,
    action: String,
) -> TableLink {
    let mut next = query.clone();
    next.apply(update);
    TableLink {
        current: next == *query,
        href: query_href(base, &next),
        label,
        action,
    }
}

/// The query saved in the session, or the default.
pub async fn saved_query(session: &Session) -> GemQuery {
    session
        .get::<GemQuery>(session_keys::INVENTORY_QUERY)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unreadable saved inventory query");
            None
        })
        .unwrap_or_default()
}

async fn save_query(session: &Session, query: &GemQuery) -> Result<(), AppError> {
    session
        .insert(session_keys::INVENTORY_QUERY, query)
        .await
        .map_err(AppError::from)
}

// =============================================================================
// View Construction
// =============================================================================

impl TableView {
    /// Build the table for `query` from a backend result.
    ///
    /// A failed fetch yields an empty table with an error banner whose retry
    /// link is the same query.
    #[must_use]
    pub fn new(base: &str, query: &GemQuery, result: Result<GemPage, ApiError>) -> Self {
        let (gems, meta, error) = match result {
            Ok(page) => (page.gems, page.meta, None),
            Err(e) => (
                Vec::new(),
                PageMeta::new(query.page, query.page_size, 0),
                Some(e.user_message()),
            ),
        };

        let columns = [
            ("Stock ID", SortField::StockId),
            ("Stone", SortField::StoneType),
            ("Carat", SortField::Carat),
            ("Price", SortField::Price),
            ("Added", SortField::CreatedAt),
        ]
        .into_iter()
        .map(|(label, field)| {
            let sorted = query.sort.field == field;
            let (aria_sort, indicator) = match (sorted, query.sort.direction) {
                (false, _) => ("none", ""),
                (true, SortDirection::Asc) => ("ascending", "\u{25b2}"),
                (true, SortDirection::Desc) => ("descending", "\u{25bc}"),
            };
            let mut sort_link = link(
                base,
                query,
                QueryUpdate::ToggleSort(field),
                label.to_string(),
                encode_action(&[(param::ACTION, "sort"), (param::FIELD, field.as_str())]),
            );
            sort_link.current = sorted;
            SortColumn {
                label,
                link: sort_link,
                aria_sort,
                indicator,
            }
        })
        .collect();

        let page_link = |page: u32, label: String| {
            let page_str = page.to_string();
            link(
                base,
                query,
                QueryUpdate::Page(page),
                label,
                encode_action(&[(param::ACTION, "page"), (param::PAGE, &page_str)]),
            )
        };

        let last_page = meta.total_pages.max(1);
        let first = meta.current_page.saturating_sub(PAGE_WINDOW).max(1);
        let last = meta.current_page.saturating_add(PAGE_WINDOW).min(last_page);
        let pages = (first..=last)
            .map(|p| TableLink {
                current: p == meta.current_page,
                ..page_link(p, p.to_string())
            })
            .collect();
        let prev = meta
            .has_prev
            .then(|| page_link(meta.current_page - 1, "Previous".to_string()));
        let next = meta
            .has_next
            .then(|| page_link(meta.current_page + 1, "Next".to_string()));

        let page_sizes = PAGE_SIZES
            .iter()
            .map(|&size| {
                let size_str = size.to_string();
                let mut size_link = link(
                    base,
                    query,
                    QueryUpdate::PageSize(size),
                    size_str.clone(),
                    encode_action(&[(param::ACTION, "page_size"), (param::LIMIT, &size_str)]),
                );
                size_link.current = query.page_size == size;
                size_link
            })
            .collect();

        let reset = link(
            base,
            query,
            QueryUpdate::Reset,
            "Clear all".to_string(),
            encode_action(&[(param::ACTION, "reset")]),
        );

        Self {
            gems,
            meta,
            search: query.search.clone(),
            active_filters: query.filters.active_count(),
            self_href: query_href(base, query),
            error,
            columns,
            pages,
            prev,
            next,
            page_sizes,
            reset,
        }
    }
}

impl FilterPanel {
    /// Checkbox lists from the backend's filter options, with the current
    /// selection checked. Selected values missing from the options are kept.
    #[must_use]
    pub fn new(query: &GemQuery, options: &FilterOptions) -> Self {
        let f = &query.filters;
        let groups = [
            ("Stone type", param::STONE_TYPE, &options.stone_types, &f.stone_types),
            ("Color", param::COLOR, &options.colors, &f.colors),
            ("Shape", param::SHAPE, &options.shapes, &f.shapes),
            ("Origin", param::ORIGIN, &options.origins, &f.origins),
            ("Treatment", param::TREATMENT, &options.treatments, &f.treatments),
            ("Lab", param::CERTIFICATE, &options.certificates, &f.certificates),
        ]
        .into_iter()
        .map(|(label, param, available, selected)| {
            let mut choices: Vec<FilterChoice> = available
                .iter()
                .map(|value| FilterChoice {
                    checked: selected.contains(value),
                    value: value.clone(),
                })
                .collect();
            choices.extend(
                selected
                    .iter()
                    .filter(|value| !available.contains(*value))
                    .map(|value| FilterChoice {
                        value: value.clone(),
                        checked: true,
                    }),
            );
            FilterGroup {
                label,
                param,
                choices,
            }
        })
        .filter(|group| !group.choices.is_empty())
        .collect();

        let carried = query
            .to_query_pairs()
            .into_iter()
            .filter(|(key, _)| matches!(*key, param::SORT_BY | param::SORT_ORDER | param::LIMIT))
            .collect();

        Self {
            groups,
            carat_min: f.carat_min.map(|v| v.to_string()).unwrap_or_default(),
            carat_max: f.carat_max.map(|v| v.to_string()).unwrap_or_default(),
            availability: match f.availability {
                None => "",
                Some(true) => "true",
                Some(false) => "false",
            },
            search: query.search.clone(),
            carried,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the inventory page.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireInventoryAccess(auth): RequireInventoryAccess,
    nonce: CspNonce,
    RawQuery(raw): RawQuery,
) -> Result<InventoryTemplate, AppError> {
    let pairs = parse_pairs(raw.as_deref());
    let query = if pairs.is_empty() {
        saved_query(auth.session()).await
    } else {
        GemQuery::from_pairs(pairs)
    };
    save_query(auth.session(), &query).await?;

    let token = auth.token();
    let (result, options) = tokio::join!(
        state.api().list_gems(token, &query),
        state.api().filter_options(token),
    );
    if let Err(e) = &result {
        tracing::warn!(error = %e, "Inventory fetch failed");
    }
    let options = options.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Filter options unavailable");
        FilterOptions::default()
    });

    Ok(InventoryTemplate {
        nav: Nav::new(&auth, &nonce),
        panel: FilterPanel::new(&query, &options),
        table: TableView::new(INVENTORY_PATH, &query, result),
    })
}

/// Apply one table action and return the table partial.
///
/// Without an `action` the parameters are taken as a complete query (the
/// retry link of an error banner).
///
/// # Errors
///
/// Returns an error if the session cannot be written.
#[instrument(skip_all, fields(action))]
pub async fn table(
    State(state): State<AppState>,
    RequireInventoryAccess(auth): RequireInventoryAccess,
    RawQuery(raw): RawQuery,
) -> Result<Response, AppError> {
    let pairs = parse_pairs(raw.as_deref());
    let mut query = saved_query(auth.session()).await;
    match QueryUpdate::from_pairs(pairs.iter().map(|(k, v)| (k, v))) {
        Some(update) => {
            tracing::Span::current().record("action", tracing::field::debug(&update));
            query.apply(update);
        }
        None if !pairs.is_empty() => query = GemQuery::from_pairs(pairs),
        None => {}
    }
    save_query(auth.session(), &query).await?;

    let key = fetch_key(auth.session());
    let fetch = state
        .queries()
        .run(&key, state.api().list_gems(auth.token(), &query))
        .await;

    let result = match fetch {
        Ok(Fetch::Superseded) => return Ok(StatusCode::NO_CONTENT.into_response()),
        Ok(Fetch::Completed(page)) => Ok(page),
        Err(e) => {
            tracing::warn!(error = %e, "Inventory fetch failed");
            Err(e)
        }
    };

    Ok(TableTemplate {
        table: TableView::new(INVENTORY_PATH, &query, result),
    }
    .into_response())
}

/// Key for coordinating table fetches: one per browser session.
///
/// A session that has not been stored yet gets a key of its own.
fn fetch_key(session: &Session) -> String {
    session.id().map_or_else(
        || format!("unsaved-{}", Uuid::new_v4()),
        |id| format!("session-{id}"),
    )
}

/// Display one gem.
///
/// # Errors
///
/// Returns 404 if the backend does not know the gem.
#[instrument(skip(state, auth, nonce))]
pub async fn show(
    State(state): State<AppState>,
    RequireInventoryAccess(auth): RequireInventoryAccess,
    nonce: CspNonce,
    Path(id): Path<String>,
) -> Result<GemTemplate, AppError> {
    let gem = state.api().get_gem(auth.token(), &GemId::new(id)).await?;
    let back_href = query_href(INVENTORY_PATH, &saved_query(auth.session()).await);

    Ok(GemTemplate {
        nav: Nav::new(&auth, &nonce),
        gem,
        back_href,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn gem(id: &str) -> Gem {
        serde_json::from_value(serde_json::json!({
            "_id": id,
            "stockId": format!("ST-{id}"),
            "stoneType": "Sapphire",
            "color": "Blue",
            "shape": "Oval",
            "carat": 1.5
        }))
        .unwrap()
    }

    fn page(n: u32, total: u64) -> GemPage {
        GemPage {
            gems: vec![gem("a"), gem("b")],
            meta: PageMeta::new(n, 25, total),
        }
    }

    #[test]
    fn test_fetch_key_follows_session_not_user() {
        use std::sync::Arc;
        use tower_sessions::MemoryStore;
        use tower_sessions::session::Id;

        let store = Arc::new(MemoryStore::default());
        let id = Id(41);
        let tab = Session::new(Some(id), Arc::clone(&store), None);
        let same_cookie = Session::new(Some(id), Arc::clone(&store), None);
        let other_device = Session::new(Some(Id(42)), Arc::clone(&store), None);
        assert_eq!(fetch_key(&tab), fetch_key(&same_cookie));
        assert_ne!(fetch_key(&tab), fetch_key(&other_device));

        let fresh = Session::new(None, Arc::clone(&store), None);
        let also_fresh = Session::new(None, store, None);
        assert_ne!(fetch_key(&fresh), fetch_key(&also_fresh));
    }

    #[test]
    fn test_query_href_repeats_keys() {
        let query = GemQuery::from_pairs([
            ("stoneType", "Ruby"),
            ("stoneType", "Sapphire"),
            ("color", "Pigeon blood"),
        ]);
        let href = query_href(INVENTORY_PATH, &query);
        assert!(href.starts_with("/inventory?"));
        assert!(href.contains("stoneType=Ruby&stoneType=Sapphire"));
        assert!(href.contains("color=Pigeon+blood"));
        assert!(!href.contains("%2C"));
    }

    #[test]
    fn test_pagination_window_and_neighbours() {
        let mut query = GemQuery::default();
        query.update_page(5);
        let table = TableView::new(INVENTORY_PATH, &query, Ok(page(5, 1000)));

        let labels: Vec<_> = table.pages.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, ["3", "4", "5", "6", "7"]);
        assert!(table.pages[2].current);
        assert!(table.prev.unwrap().href.contains("page=4"));
        assert_eq!(table.next.unwrap().action, "action=page&page=6");
    }

    #[test]
    fn test_bookmarked_page_past_the_end() {
        let mut query = GemQuery::default();
        query.update_page(10);
        let table = TableView::new(INVENTORY_PATH, &query, Ok(page(10, 60)));

        let labels: Vec<_> = table.pages.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, ["1", "2", "3"]);
        assert!(table.pages[2].current);
        assert!(table.next.is_none());
        assert!(table.prev.unwrap().href.contains("page=2"));
    }

    #[test]
    fn test_sort_link_resets_page() {
        let mut query = GemQuery::default();
        query.update_page(3);
        let table = TableView::new(INVENTORY_PATH, &query, Ok(page(3, 200)));
        let carat = table.columns.iter().find(|c| c.label == "Carat").unwrap();
        assert!(carat.link.href.contains("page=1&"));
        assert!(carat.link.href.contains("sortBy=carat&sortOrder=asc"));
        assert_eq!(carat.aria_sort, "none");
    }

    #[test]
    fn test_failed_fetch_shows_banner_with_retry() {
        let query = GemQuery::from_pairs([("stoneType", "Emerald")]);
        let table = TableView::new(
            INVENTORY_PATH,
            &query,
            Err(ApiError::Api {
                status: 503,
                message: "down".to_string(),
            }),
        );
        assert!(table.error.is_some());
        assert!(table.gems.is_empty());
        assert_eq!(table.self_href, query_href(INVENTORY_PATH, &query));
    }

    #[test]
    fn test_filter_panel_keeps_unknown_selection() {
        let query = GemQuery::from_pairs([("origin", "Kashmir"), ("limit", "50")]);
        let options = FilterOptions {
            origins: vec!["Burma".to_string(), "Ceylon".to_string()],
            ..FilterOptions::default()
        };
        let panel = FilterPanel::new(&query, &options);
        assert_eq!(panel.groups.len(), 1);
        let origins = &panel.groups[0];
        assert_eq!(origins.param, "origin");
        assert_eq!(origins.choices.len(), 3);
        assert!(origins.choices.iter().any(|c| c.value == "Kashmir" && c.checked));
        assert!(panel.carried.contains(&("limit", "50".to_string())));
    }
}
