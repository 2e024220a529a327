//! Storefront-local models.
//!
//! Domain records (`User`, `Gem`, `Quotation`) live in `gemvault-core`; this
//! module only holds what is specific to the web layer.

pub mod nav;
pub mod session;

pub use nav::Nav;
pub use session::{ACCESS_TOKEN_COOKIE, keys as session_keys};
