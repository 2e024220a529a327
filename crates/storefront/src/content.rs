//! Markdown content pages (about, gem knowledge, and anything else under
//! `content/pages`).
//!
//! Pages are loaded once at startup, front matter is parsed with
//! `gray_matter`, and the body is rendered to HTML with `comrak`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use comrak::{Options, markdown_to_html};
use gray_matter::{Matter, ParsedEntity, engine::YAML};
use serde::Deserialize;
use thiserror::Error;

/// Errors loading content.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Front matter of a content page.
#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<NaiveDate>,
    /// Sort key for the footer link list.
    #[serde(default)]
    pub order: Option<u32>,
}

/// A rendered page with metadata and HTML content.
#[derive(Debug, Clone)]
pub struct Page {
    pub slug: String,
    pub meta: PageMeta,
    pub content_html: String,
}

/// All content pages, held in memory.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    pages: Arc<HashMap<String, Page>>,
}

impl ContentStore {
    /// Load every `*.md` file under `<content_dir>/pages`.
    ///
    /// A missing directory yields an empty store; a file that fails to parse
    /// is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the pages directory exists but cannot be read.
    pub fn load(content_dir: &Path) -> Result<Self, ContentError> {
        let dir = content_dir.join("pages");
        let mut pages = HashMap::new();

        if !dir.exists() {
            tracing::warn!("Pages directory does not exist: {:?}", dir);
            return Ok(Self::default());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| ContentError::Io(e.to_string()))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                match load_page(&path) {
                    Ok(page) => {
                        tracing::info!("Loaded page: {}", page.slug);
                        pages.insert(page.slug.clone(), page);
                    }
                    Err(e) => {
                        tracing::error!("Failed to load page {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(Self {
            pages: Arc::new(pages),
        })
    }

    /// Get a page by slug.
    #[must_use]
    pub fn get_page(&self, slug: &str) -> Option<&Page> {
        self.pages.get(slug)
    }

    /// Pages ordered for navigation (by `order`, then title).
    #[must_use]
    pub fn ordered_pages(&self) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self.pages.values().collect();
        pages.sort_by(|a, b| {
            a.meta
                .order
                .unwrap_or(u32::MAX)
                .cmp(&b.meta.order.unwrap_or(u32::MAX))
                .then_with(|| a.meta.title.cmp(&b.meta.title))
        });
        pages
    }
}

/// Load one page; the slug is the file stem.
fn load_page(path: &Path) -> Result<Page, ContentError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ContentError::Io(e.to_string()))?;
    let slug = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ContentError::Parse("Invalid filename".to_string()))?
        .to_string();
    parse_page(slug, &raw)
}

/// Parse front matter and render the markdown body.
fn parse_page(slug: String, raw: &str) -> Result<Page, ContentError> {
    let matter = Matter::<YAML>::new();
    let parsed: ParsedEntity<PageMeta> = matter
        .parse(raw)
        .map_err(|e| ContentError::Parse(format!("Failed to parse frontmatter: {e}")))?;
    let meta = parsed
        .data
        .ok_or_else(|| ContentError::Parse("Missing frontmatter".to_string()))?;

    Ok(Page {
        slug,
        meta,
        content_html: render_markdown(&parsed.content),
    })
}

/// Render markdown to HTML with GitHub Flavored Markdown support.
///
/// Raw HTML in the source is escaped; content pages are plain markdown.
fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    markdown_to_html(content, &options)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CARE_GUIDE: &str = "---\ntitle: Caring for Emeralds\ndescription: Oils, resins and ultrasonic cleaners\norder: 2\n---\n\n## Cleaning\n\n| Stone | Ultrasonic |\n|-------|-----------|\n| Emerald | No |\n";

    #[test]
    fn test_parse_page_front_matter_and_table() {
        let page = parse_page("emerald-care".to_string(), CARE_GUIDE).unwrap();
        assert_eq!(page.meta.title, "Caring for Emeralds");
        assert_eq!(page.meta.order, Some(2));
        assert!(page.content_html.contains("<table>"));
        assert!(page.content_html.contains("id=\"cleaning\""));
    }

    #[test]
    fn test_missing_front_matter_is_an_error() {
        assert!(parse_page("bare".to_string(), "# Just a heading\n").is_err());
    }

    #[test]
    fn test_raw_html_is_not_passed_through() {
        let page = parse_page(
            "x".to_string(),
            "---\ntitle: X\n---\n\n<script>alert(1)</script>\n",
        )
        .unwrap();
        assert!(!page.content_html.contains("<script>"));
    }

    #[test]
    fn test_missing_directory_yields_empty_store() {
        let store = ContentStore::load(Path::new("/definitely/not/here")).unwrap();
        assert!(store.get_page("about").is_none());
        assert!(store.ordered_pages().is_empty());
    }
}
