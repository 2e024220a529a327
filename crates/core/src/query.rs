//! Inventory query state: filters, search, sort and pagination.
//!
//! [`GemQuery`] is the single source of truth for what the inventory table is
//! showing. Every setter except [`GemQuery::update_page`] sends the table back
//! to page 1, since the old page number is meaningless once the result set
//! changes.
//!
//! The same key names are used for the storefront's own URLs and for the
//! backend's `/api/gems` query string. Multi-valued filters are written as
//! repeated keys (`stoneType=Ruby&stoneType=Spinel`), never comma-joined.

use serde::{Deserialize, Serialize};

use crate::types::Gem;

/// Allowed page sizes, smallest first.
pub const PAGE_SIZES: [u32; 4] = [10, 25, 50, 100];

/// Page size used when none (or an unsupported one) is requested.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Query-string key names.
pub mod param {
    pub const PAGE: &str = "page";
    pub const LIMIT: &str = "limit";
    pub const SEARCH: &str = "search";
    pub const SORT_BY: &str = "sortBy";
    pub const SORT_ORDER: &str = "sortOrder";
    pub const STONE_TYPE: &str = "stoneType";
    pub const COLOR: &str = "color";
    pub const SHAPE: &str = "shape";
    pub const ORIGIN: &str = "origin";
    pub const TREATMENT: &str = "treatment";
    pub const CERTIFICATE: &str = "certificate";
    pub const MIN_CARAT: &str = "minCarat";
    pub const MAX_CARAT: &str = "maxCarat";
    pub const AVAILABILITY: &str = "availability";
    pub const ACTION: &str = "action";
    pub const FIELD: &str = "field";
}

/// Attribute filters. Empty vectors mean "any".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GemFilters {
    pub stone_types: Vec<String>,
    pub colors: Vec<String>,
    pub shapes: Vec<String>,
    pub origins: Vec<String>,
    pub treatments: Vec<String>,
    pub certificates: Vec<String>,
    pub carat_min: Option<f64>,
    pub carat_max: Option<f64>,
    pub availability: Option<bool>,
}

impl GemFilters {
    /// Trim values, drop blanks and duplicates, and order the carat range.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for values in [
            &mut self.stone_types,
            &mut self.colors,
            &mut self.shapes,
            &mut self.origins,
            &mut self.treatments,
            &mut self.certificates,
        ] {
            let mut seen = Vec::with_capacity(values.len());
            for value in values.drain(..) {
                let value = value.trim().to_string();
                if !value.is_empty() && !seen.contains(&value) {
                    seen.push(value);
                }
            }
            *values = seen;
        }

        self.carat_min = self.carat_min.filter(|c| c.is_finite() && *c >= 0.0);
        self.carat_max = self.carat_max.filter(|c| c.is_finite() && *c >= 0.0);
        if let (Some(min), Some(max)) = (self.carat_min, self.carat_max)
            && min > max
        {
            self.carat_min = Some(max);
            self.carat_max = Some(min);
        }
        self
    }

    /// Number of active filter groups, for the "Filters (3)" badge.
    #[must_use]
    pub fn active_count(&self) -> usize {
        let lists = [
            &self.stone_types,
            &self.colors,
            &self.shapes,
            &self.origins,
            &self.treatments,
            &self.certificates,
        ]
        .iter()
        .filter(|v| !v.is_empty())
        .count();
        let carat = usize::from(self.carat_min.is_some() || self.carat_max.is_some());
        lists + carat + usize::from(self.availability.is_some())
    }

    /// Whether no filter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }
}

/// Sortable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortField {
    #[default]
    CreatedAt,
    StockId,
    StoneType,
    Carat,
    Price,
}

impl SortField {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::StockId => "stockId",
            Self::StoneType => "stoneType",
            Self::Carat => "carat",
            Self::Price => "price",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        [
            Self::CreatedAt,
            Self::StockId,
            Self::StoneType,
            Self::Carat,
            Self::Price,
        ]
        .into_iter()
        .find(|f| f.as_str() == s)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// The opposite direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Column plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

/// One change to a [`GemQuery`], as produced by a table control.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryUpdate {
    Filters(GemFilters),
    Search(String),
    Sort(SortSpec),
    /// Clicking a column header: same column flips, new column sorts ascending.
    ToggleSort(SortField),
    Page(u32),
    PageSize(u32),
    Reset,
}

impl QueryUpdate {
    /// Decode a table action from query pairs (`action=page&page=3`).
    ///
    /// Returns `None` for a missing or unknown action.
    pub fn from_pairs<I, K, V>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        match get(param::ACTION)? {
            "filters" => Some(Self::Filters(
                GemQuery::from_pairs(pairs.iter().map(|(k, v)| (k, v))).filters,
            )),
            "search" => Some(Self::Search(get(param::SEARCH).unwrap_or("").to_string())),
            "sort" => SortField::parse(get(param::FIELD)?).map(Self::ToggleSort),
            "page" => get(param::PAGE)?.parse().ok().map(Self::Page),
            "page_size" => get(param::LIMIT)?.parse().ok().map(Self::PageSize),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// The full inventory query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemQuery {
    pub filters: GemFilters,
    pub search: String,
    pub sort: SortSpec,
    pub page: u32,
    pub page_size: u32,
}

impl Default for GemQuery {
    fn default() -> Self {
        Self {
            filters: GemFilters::default(),
            search: String::new(),
            sort: SortSpec::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl GemQuery {
    /// Replace the filters and go back to page 1.
    pub fn update_filters(&mut self, filters: GemFilters) {
        self.filters = filters.normalized();
        self.page = 1;
    }

    /// Replace the search text and go back to page 1.
    pub fn update_search(&mut self, search: impl Into<String>) {
        self.search = search.into().trim().to_string();
        self.page = 1;
    }

    /// Replace the sort and go back to page 1.
    pub fn update_sort(&mut self, sort: SortSpec) {
        self.sort = sort;
        self.page = 1;
    }

    /// Jump to a page (pages are 1-based).
    pub fn update_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Change the page size and go back to page 1.
    ///
    /// Unsupported sizes fall back to [`DEFAULT_PAGE_SIZE`].
    pub fn update_page_size(&mut self, page_size: u32) {
        self.page_size = if PAGE_SIZES.contains(&page_size) {
            page_size
        } else {
            DEFAULT_PAGE_SIZE
        };
        self.page = 1;
    }

    /// Apply one table action.
    pub fn apply(&mut self, update: QueryUpdate) {
        match update {
            QueryUpdate::Filters(filters) => self.update_filters(filters),
            QueryUpdate::Search(search) => self.update_search(search),
            QueryUpdate::Sort(sort) => self.update_sort(sort),
            QueryUpdate::ToggleSort(field) => {
                let direction = if self.sort.field == field {
                    self.sort.direction.flipped()
                } else {
                    SortDirection::Asc
                };
                self.update_sort(SortSpec { field, direction });
            }
            QueryUpdate::Page(page) => self.update_page(page),
            QueryUpdate::PageSize(size) => self.update_page_size(size),
            QueryUpdate::Reset => *self = Self::default(),
        }
    }

    /// Whether this query should go to the search endpoint.
    #[must_use]
    pub fn is_search(&self) -> bool {
        !self.search.is_empty()
    }

    /// Serialize to query pairs with repeated keys for multi-valued filters.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (param::PAGE, self.page.to_string()),
            (param::LIMIT, self.page_size.to_string()),
            (param::SORT_BY, self.sort.field.as_str().to_string()),
            (param::SORT_ORDER, self.sort.direction.as_str().to_string()),
        ];
        if self.is_search() {
            pairs.push((param::SEARCH, self.search.clone()));
        }

        let f = &self.filters;
        for (key, values) in [
            (param::STONE_TYPE, &f.stone_types),
            (param::COLOR, &f.colors),
            (param::SHAPE, &f.shapes),
            (param::ORIGIN, &f.origins),
            (param::TREATMENT, &f.treatments),
            (param::CERTIFICATE, &f.certificates),
        ] {
            pairs.extend(values.iter().map(|v| (key, v.clone())));
        }
        if let Some(min) = f.carat_min {
            pairs.push((param::MIN_CARAT, min.to_string()));
        }
        if let Some(max) = f.carat_max {
            pairs.push((param::MAX_CARAT, max.to_string()));
        }
        if let Some(available) = f.availability {
            pairs.push((param::AVAILABILITY, available.to_string()));
        }
        pairs
    }

    /// Parse from query pairs. Unknown keys and unparsable values are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Self::default();
        let mut filters = GemFilters::default();
        let mut page = None;
        let mut page_size = None;

        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                param::PAGE => page = value.parse::<u32>().ok(),
                param::LIMIT => page_size = value.parse::<u32>().ok(),
                param::SEARCH => query.search = value.trim().to_string(),
                param::SORT_BY => {
                    if let Some(field) = SortField::parse(value) {
                        query.sort.field = field;
                    }
                }
                param::SORT_ORDER => match value {
                    "asc" => query.sort.direction = SortDirection::Asc,
                    "desc" => query.sort.direction = SortDirection::Desc,
                    _ => {}
                },
                param::STONE_TYPE => filters.stone_types.push(value.to_string()),
                param::COLOR => filters.colors.push(value.to_string()),
                param::SHAPE => filters.shapes.push(value.to_string()),
                param::ORIGIN => filters.origins.push(value.to_string()),
                param::TREATMENT => filters.treatments.push(value.to_string()),
                param::CERTIFICATE => filters.certificates.push(value.to_string()),
                param::MIN_CARAT => filters.carat_min = value.parse().ok(),
                param::MAX_CARAT => filters.carat_max = value.parse().ok(),
                param::AVAILABILITY => filters.availability = value.parse().ok(),
                _ => {}
            }
        }

        query.filters = filters.normalized();
        if let Some(size) = page_size {
            query.update_page_size(size);
        }
        if let Some(page) = page {
            query.update_page(page);
        }
        query
    }
}

/// Pagination metadata derived from a result count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageMeta {
    /// Compute metadata. An empty result has zero pages.
    ///
    /// A page past the end (a stale bookmark) is clamped to the last page.
    #[must_use]
    pub fn new(current_page: u32, page_size: u32, total_count: u64) -> Self {
        let size = u64::from(page_size.max(1));
        let total_pages = u32::try_from(total_count.div_ceil(size)).unwrap_or(u32::MAX);
        let current_page = current_page.clamp(1, total_pages.max(1));
        Self {
            current_page,
            page_size: page_size.max(1),
            total_count,
            total_pages,
            has_next: current_page < total_pages,
            has_prev: current_page > 1,
        }
    }

    /// 1-based index of the first row on this page (0 when empty).
    #[must_use]
    pub fn first_item(&self) -> u64 {
        if self.total_count == 0 {
            return 0;
        }
        (u64::from(self.current_page) - 1) * u64::from(self.page_size) + 1
    }

    /// 1-based index of the last row on this page.
    #[must_use]
    pub fn last_item(&self) -> u64 {
        (u64::from(self.current_page) * u64::from(self.page_size)).min(self.total_count)
    }
}

/// One page of gems.
#[derive(Debug, Clone, PartialEq)]
pub struct GemPage {
    pub gems: Vec<Gem>,
    pub meta: PageMeta,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn on_page_four() -> GemQuery {
        let mut query = GemQuery::default();
        query.update_page(4);
        query
    }

    #[test]
    fn test_filter_change_resets_page() {
        let mut query = on_page_four();
        query.update_filters(GemFilters {
            stone_types: vec!["Ruby".to_string()],
            ..GemFilters::default()
        });
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_search_sort_and_size_changes_reset_page() {
        let mut query = on_page_four();
        query.update_search("  pigeon blood ");
        assert_eq!((query.page, query.search.as_str()), (1, "pigeon blood"));

        let mut query = on_page_four();
        query.update_sort(SortSpec {
            field: SortField::Carat,
            direction: SortDirection::Asc,
        });
        assert_eq!(query.page, 1);

        let mut query = on_page_four();
        query.update_page_size(50);
        assert_eq!((query.page, query.page_size), (1, 50));
    }

    #[test]
    fn test_update_page_keeps_other_state() {
        let mut query = GemQuery::default();
        query.update_search("spinel");
        query.update_page(3);
        assert_eq!(query.page, 3);
        assert_eq!(query.search, "spinel");
        query.update_page(0);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_unsupported_page_size_falls_back() {
        let mut query = GemQuery::default();
        query.update_page_size(7);
        assert_eq!(query.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_array_params_use_repeated_keys() {
        let mut query = GemQuery::default();
        query.update_filters(GemFilters {
            stone_types: vec!["Ruby".to_string(), "Sapphire".to_string()],
            colors: vec!["Blue".to_string()],
            ..GemFilters::default()
        });
        let pairs = query.to_query_pairs();
        let stone_types: Vec<_> = pairs
            .iter()
            .filter(|(k, _)| *k == param::STONE_TYPE)
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(stone_types, vec!["Ruby", "Sapphire"]);
        assert!(pairs.iter().all(|(_, v)| !v.contains(',')));
    }

    #[test]
    fn test_pairs_parse_back() {
        let query = GemQuery::from_pairs([
            ("stoneType", "Ruby"),
            ("stoneType", "Spinel"),
            ("stoneType", "Ruby"),
            ("minCarat", "3"),
            ("maxCarat", "1.5"),
            ("availability", "true"),
            ("sortBy", "carat"),
            ("sortOrder", "asc"),
            ("limit", "50"),
            ("page", "2"),
            ("bogus", "x"),
        ]);
        assert_eq!(query.filters.stone_types, vec!["Ruby", "Spinel"]);
        assert_eq!(query.filters.carat_min, Some(1.5));
        assert_eq!(query.filters.carat_max, Some(3.0));
        assert_eq!(query.filters.availability, Some(true));
        assert_eq!(query.sort.field, SortField::Carat);
        assert_eq!(query.sort.direction, SortDirection::Asc);
        assert_eq!((query.page, query.page_size), (2, 50));
        assert_eq!(query.filters.active_count(), 3);
    }

    #[test]
    fn test_toggle_sort_flips_same_column() {
        let mut query = GemQuery::default();
        query.apply(QueryUpdate::ToggleSort(SortField::Carat));
        assert_eq!(query.sort.direction, SortDirection::Asc);
        query.apply(QueryUpdate::ToggleSort(SortField::Carat));
        assert_eq!(query.sort.direction, SortDirection::Desc);
        query.apply(QueryUpdate::ToggleSort(SortField::Price));
        assert_eq!(
            query.sort,
            SortSpec {
                field: SortField::Price,
                direction: SortDirection::Asc
            }
        );
    }

    #[test]
    fn test_update_from_action_pairs() {
        assert_eq!(
            QueryUpdate::from_pairs([("action", "page"), ("page", "5")]),
            Some(QueryUpdate::Page(5))
        );
        assert_eq!(
            QueryUpdate::from_pairs([("action", "sort"), ("field", "stockId")]),
            Some(QueryUpdate::ToggleSort(SortField::StockId))
        );
        assert_eq!(
            QueryUpdate::from_pairs([("action", "filters"), ("color", "Blue")]),
            Some(QueryUpdate::Filters(GemFilters {
                colors: vec!["Blue".to_string()],
                ..GemFilters::default()
            }))
        );
        assert_eq!(QueryUpdate::from_pairs([("action", "explode")]), None);
        assert_eq!(QueryUpdate::from_pairs([("page", "2")]), None);
    }

    #[test]
    fn test_page_meta() {
        let meta = PageMeta::new(2, 25, 60);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_prev);
        assert!(meta.has_next);
        assert_eq!((meta.first_item(), meta.last_item()), (26, 50));

        let last = PageMeta::new(3, 25, 60);
        assert!(!last.has_next);
        assert_eq!(last.last_item(), 60);

        let empty = PageMeta::new(1, 25, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next && !empty.has_prev);
        assert_eq!(empty.first_item(), 0);
    }

    #[test]
    fn test_page_meta_clamps_page_past_the_end() {
        let meta = PageMeta::new(10, 25, 60);
        assert_eq!(meta.current_page, 3);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
        assert_eq!((meta.first_item(), meta.last_item()), (51, 60));

        let empty = PageMeta::new(4, 25, 0);
        assert_eq!(empty.current_page, 1);
        assert!(!empty.has_prev);
    }
}
