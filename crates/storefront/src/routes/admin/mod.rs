//! Staff pages. Every handler here takes [`RequireAdmin`](crate::middleware::RequireAdmin).

pub mod gems;
pub mod quotations;

use serde::Deserialize;

/// Flash-style messages passed through the query string after a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct AdminNotice {
    pub notice: Option<String>,
    pub error: Option<String>,
}

impl AdminNotice {
    /// Human text for a known notice code.
    #[must_use]
    pub fn message(&self) -> Option<&'static str> {
        match self.notice.as_deref()? {
            "created" => Some("Gem created."),
            "updated" => Some("Gem updated."),
            "deleted" => Some("Gem deleted."),
            "uploaded" => Some("Files uploaded."),
            "decided" => Some("Quotation updated."),
            _ => None,
        }
    }
}

/// `path?error=<message>`, for redirect-after-post failures.
pub(crate) fn with_error(path: &str, message: &str) -> String {
    format!("{path}?error={}", urlencoding::encode(message))
}
