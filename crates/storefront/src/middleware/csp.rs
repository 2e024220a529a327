//! Content Security Policy with per-request script nonces.
//!
//! [`csp_middleware`] generates a nonce, stores it in the request extensions
//! for templates, and writes the matching `Content-Security-Policy` header on
//! the way out. Gem media is served from the backend and from S3, so those
//! origins are allowed for images and video.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, header::CONTENT_SECURITY_POLICY, request::Parts},
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

use crate::state::AppState;

/// Bucket hosts the backend hands out for uploaded assets.
const ASSET_BUCKET_ORIGIN: &str = "https://*.amazonaws.com";

/// A 128-bit, base64-encoded nonce for inline scripts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CspNonce(String);

impl CspNonce {
    /// Generate a new random nonce.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Build the policy for one response.
///
/// `media_origin` is the backend's origin (`https://api.example.com`).
#[must_use]
pub fn content_security_policy(nonce: &CspNonce, media_origin: &str) -> String {
    format!(
        "default-src 'none'; \
         script-src 'self' 'nonce-{nonce}'; \
         style-src 'self'; \
         font-src 'self'; \
         img-src 'self' data: {media_origin} {ASSET_BUCKET_ORIGIN}; \
         media-src 'self' {media_origin} {ASSET_BUCKET_ORIGIN}; \
         connect-src 'self'; \
         frame-src 'none'; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self'; \
         frame-ancestors 'none'",
        nonce = nonce.as_str(),
    )
}

/// Generate the nonce, run the request, then attach the policy header.
pub async fn csp_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let nonce = CspNonce::generate();
    request.extensions_mut().insert(nonce.clone());

    let mut response = next.run(request).await;

    let policy = content_security_policy(&nonce, &state.config().api.origin());
    match HeaderValue::from_str(&policy) {
        Ok(value) => {
            response.headers_mut().insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => tracing::error!(error = %e, "Unencodable CSP header"),
    }
    response
}

impl<S> FromRequestParts<S> for CspNonce
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            tracing::warn!("CSP nonce missing from request extensions");
            Self(String::new())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonces_are_unique_and_sized() {
        let a = CspNonce::generate();
        let b = CspNonce::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 24);
    }

    #[test]
    fn test_policy_includes_nonce_and_media_origin() {
        let nonce = CspNonce("abc123==".to_string());
        let policy = content_security_policy(&nonce, "https://api.gemvault.test");
        assert!(policy.contains("script-src 'self' 'nonce-abc123=='"));
        assert!(policy.contains("img-src 'self' data: https://api.gemvault.test"));
        assert!(policy.contains("media-src 'self' https://api.gemvault.test"));
        assert!(policy.contains("frame-ancestors 'none'"));
        assert!(HeaderValue::from_str(&policy).is_ok());
    }
}
