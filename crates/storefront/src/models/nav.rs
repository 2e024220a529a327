//! Header/navigation data shared by every full-page template.

use crate::middleware::CspNonce;
use crate::services::auth::AuthContext;

/// What the site header needs to know about the visitor.
#[derive(Debug, Clone, Default)]
pub struct Nav {
    /// Nonce for inline `<script>` tags on this response.
    pub nonce: String,
    /// Display name when signed in.
    pub user_name: Option<String>,
    pub is_admin: bool,
    /// Whether the inventory link should be shown.
    pub can_browse: bool,
}

impl Nav {
    /// Build the header for the current visitor.
    #[must_use]
    pub fn new(auth: &AuthContext, nonce: &CspNonce) -> Self {
        let user = auth.user();
        Self {
            nonce: nonce.as_str().to_string(),
            user_name: user.map(|u| u.display_name().to_string()),
            is_admin: auth.is_admin(),
            can_browse: user.is_some_and(|u| {
                gemvault_core::guard::can_access_inventory(u.role, u.status)
            }),
        }
    }

    /// Header for a visitor who is not signed in.
    #[must_use]
    pub fn anonymous(nonce: &CspNonce) -> Self {
        Self {
            nonce: nonce.as_str().to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.user_name.is_some()
    }
}
