//! Gem Vault Core - Shared domain library.
//!
//! This crate provides the types and pure logic used by the storefront:
//! - [`types`] - Newtype IDs, roles and statuses, users, gems, quotations
//! - [`guard`] - The route guard state machine
//! - [`query`] - Inventory filter/sort/pagination state
//! - [`validation`] - Field-level form validation errors
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O and no
//! HTTP clients. Everything here can be unit tested without a runtime.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod guard;
pub mod query;
pub mod types;
pub mod validation;

pub use types::*;
pub use validation::{FieldError, ValidationErrors};
