//! Domain types for Gem Vault.
//!
//! These mirror the JSON documents exchanged with the inventory backend.

pub mod email;
pub mod gem;
pub mod id;
pub mod quotation;
pub mod status;
pub mod user;

pub use email::{Email, EmailError};
pub use gem::{FilterOptions, Gem, GemInput};
pub use id::*;
pub use quotation::{Quotation, QuotationDecision, QuotationInput};
pub use status::{QuotationStatus, Role, UserStatus};
pub use user::{KycProfile, Registration, User};
