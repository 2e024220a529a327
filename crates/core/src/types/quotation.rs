//! Quotation (price inquiry) records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{GemId, QuotationId, StockId, UserId};
use super::status::QuotationStatus;
use crate::validation::ValidationErrors;

/// Maximum length of a quotation message.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// A customer price inquiry, optionally about a specific gem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quotation {
    #[serde(rename = "_id", alias = "id")]
    pub id: QuotationId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub gem_id: Option<GemId>,
    #[serde(default)]
    pub stock_id: Option<StockId>,
    pub message: String,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub quoted_price: Option<f64>,
    #[serde(default)]
    pub status: QuotationStatus,
    #[serde(default)]
    pub admin_note: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Quotation {
    /// Whether staff still need to act on this quotation.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == QuotationStatus::Pending
    }
}

/// Body for submitting a quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gem_id: Option<GemId>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl QuotationInput {
    /// Check the message and quantity.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] listing each invalid field.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let message = self.message.trim();
        if message.is_empty() {
            errors.add("message", "Please describe what you are looking for");
        } else if message.chars().count() > MAX_MESSAGE_LENGTH {
            errors.add(
                "message",
                format!("Message must be at most {MAX_MESSAGE_LENGTH} characters"),
            );
        }
        if self.quantity == Some(0) {
            errors.add("quantity", "Quantity must be at least 1");
        }
        errors.into_result()
    }
}

/// Staff decision on a quotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationDecision {
    pub status: QuotationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_note: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quotation_defaults_to_pending() {
        let q: Quotation =
            serde_json::from_str(r#"{"_id":"q1","message":"Matched pair?"}"#).unwrap();
        assert!(q.is_open());
        assert_eq!(q.status, QuotationStatus::Pending);
    }

    #[test]
    fn test_input_validation() {
        let mut input = QuotationInput {
            gem_id: None,
            message: "   ".to_string(),
            quantity: Some(0),
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.message_for("message").is_some());
        assert!(errors.message_for("quantity").is_some());

        input.message = "Looking for a 3ct no-heat sapphire".to_string();
        input.quantity = Some(2);
        assert!(input.validate().is_ok());

        input.message = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(input.validate().is_err());
    }
}
