//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span and Sentry scope)
//! 4. Security headers
//! 5. CSP (per-request nonce and policy header)
//! 6. Session layer (tower-sessions, in-memory store)
//! 7. Rate limiting on `/auth` and `/api` (governor)

pub mod auth;
pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{GuardRejection, RequireAdmin, RequireAuth, RequireInventoryAccess};
pub use csp::{CspNonce, csp_middleware};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
