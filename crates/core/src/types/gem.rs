//! Gem inventory records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{GemId, StockId};
use crate::validation::ValidationErrors;

/// Maximum length of a stock id.
pub const MAX_STOCK_ID_LENGTH: usize = 64;

/// One inventory item: a loose stone or a finished piece.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gem {
    #[serde(rename = "_id", alias = "id")]
    pub id: GemId,
    pub stock_id: StockId,
    pub stone_type: String,
    pub color: String,
    pub shape: String,
    pub carat: f64,
    #[serde(default)]
    pub clarity: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub treatment: Option<String>,
    /// Grading lab or certificate reference.
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub measurements: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default = "default_availability")]
    pub availability: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    /// Certificate scans (PDF or image URLs).
    #[serde(default)]
    pub certificates: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

const fn default_availability() -> bool {
    true
}

impl Gem {
    /// First image, used as the table thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// One-line description such as `"2.05ct Oval Ruby"`.
    #[must_use]
    pub fn headline(&self) -> String {
        format!("{:.2}ct {} {}", self.carat, self.shape, self.stone_type)
    }

    /// Number of uploaded assets across all kinds.
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.images.len() + self.videos.len() + self.certificates.len()
    }
}

/// Body for creating or updating a gem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GemInput {
    pub stock_id: String,
    pub stone_type: String,
    pub color: String,
    pub shape: String,
    pub carat: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub availability: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub certificates: Vec<String>,
}

impl GemInput {
    /// Check every field and report all problems together.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] listing each invalid field.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let stock_id = self.stock_id.trim();
        if stock_id.is_empty() {
            errors.add("stock_id", "Stock ID is required");
        } else if stock_id.len() > MAX_STOCK_ID_LENGTH {
            errors.add(
                "stock_id",
                format!("Stock ID must be at most {MAX_STOCK_ID_LENGTH} characters"),
            );
        } else if stock_id.chars().any(char::is_whitespace) {
            errors.add("stock_id", "Stock ID cannot contain spaces");
        }

        for (field, value, label) in [
            ("stone_type", &self.stone_type, "Stone type"),
            ("color", &self.color, "Color"),
            ("shape", &self.shape, "Shape"),
        ] {
            if value.trim().is_empty() {
                errors.add(field, format!("{label} is required"));
            }
        }

        if !self.carat.is_finite() || self.carat <= 0.0 {
            errors.add("carat", "Carat must be greater than zero");
        }

        if let Some(price) = self.price
            && (!price.is_finite() || price < 0.0)
        {
            errors.add("price", "Price cannot be negative");
        }

        let bad_asset = self
            .images
            .iter()
            .chain(&self.videos)
            .chain(&self.certificates)
            .any(|url| !(url.starts_with("https://") || url.starts_with("http://")));
        if bad_asset {
            errors.add("assets", "Asset links must be http(s) URLs");
        }

        errors.into_result()
    }

    /// Pre-fill an edit form from an existing gem.
    #[must_use]
    pub fn from_gem(gem: &Gem) -> Self {
        Self {
            stock_id: gem.stock_id.to_string(),
            stone_type: gem.stone_type.clone(),
            color: gem.color.clone(),
            shape: gem.shape.clone(),
            carat: gem.carat,
            clarity: gem.clarity.clone(),
            origin: gem.origin.clone(),
            treatment: gem.treatment.clone(),
            certificate: gem.certificate.clone(),
            measurements: gem.measurements.clone(),
            price: gem.price,
            availability: gem.availability,
            images: gem.images.clone(),
            videos: gem.videos.clone(),
            certificates: gem.certificates.clone(),
        }
    }
}

/// Distinct values the backend offers for each filterable attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterOptions {
    pub stone_types: Vec<String>,
    pub colors: Vec<String>,
    pub shapes: Vec<String>,
    pub origins: Vec<String>,
    pub treatments: Vec<String>,
    pub certificates: Vec<String>,
}
