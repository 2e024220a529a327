//! Business logic services for storefront.
//!
//! - `auth` - Session-backed authentication context
//! - `inventory` - Last-write-wins coordination of inventory fetches
//! - `export` - CSV export of gem listings

pub mod auth;
pub mod export;
pub mod inventory;
