//! Gem Vault backend REST client.
//!
//! # Architecture
//!
//! - The backend is the source of truth: no local persistence, direct calls
//! - One shared `reqwest::Client` behind an `Arc`, cheap to clone into handlers
//! - Caller's access token is passed per call and sent as a bearer token
//! - `/filter-options` is cached in-memory via `moka` (5 minute TTL) and
//!   invalidated whenever a gem is created, updated or deleted
//! - No retries: failures are reported to the page that made the call
//!
//! # Example
//!
//! ```rust,ignore
//! use gemvault_storefront::api::ApiClient;
//!
//! let api = ApiClient::new(&config.api)?;
//! let page = api.list_gems(Some(&token), &GemQuery::default()).await?;
//! ```

mod auth;
mod gems;
mod quotations;
pub mod types;
pub mod uploads;

pub use uploads::{AssetKind, UploadBatch, UploadError, UploadFile};

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use gemvault_core::FilterOptions;

use crate::config::ApiConfig;

/// Header carrying the storefront's own API key, when configured.
const API_KEY_HEADER: &str = "x-api-key";

/// Longest slice of an error body kept in messages and logs.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Errors that can occur when calling the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured base URL cannot carry path segments.
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    /// The caller's token was missing, expired or rejected.
    #[error("Not authenticated")]
    Unauthorized,

    /// The backend refused the operation for this account.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Upload rejected before sending.
    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl ApiError {
    /// Build the error for a non-success status and its body.
    fn from_status(status: StatusCode, body: &str) -> Self {
        let message = extract_message(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string()
        });
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            _ => Self::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Message suitable for an alert banner.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http(e) if e.is_timeout() => {
                "The inventory service took too long to respond. Please try again.".to_string()
            }
            Self::Http(_) | Self::InvalidBaseUrl(_) | Self::Parse(_) => {
                "The inventory service is unavailable right now. Please try again.".to_string()
            }
            Self::Unauthorized => "Your session has expired. Please sign in again.".to_string(),
            Self::RateLimited(secs) => {
                format!("Too many requests. Please wait {secs} seconds and try again.")
            }
            Self::Forbidden(message) | Self::NotFound(message) | Self::Api { message, .. } => {
                message.clone()
            }
            Self::Upload(e) => e.to_string(),
        }
    }
}

/// Pull a human message out of a JSON error body (`message` or `error`).
fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return ["message", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
            .map(String::from);
    }
    Some(trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect())
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Gem Vault backend.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    filter_cache: Cache<&'static str, FilterOptions>,
}

const FILTER_OPTIONS_KEY: &str = "filter-options";

impl ApiClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("gemvault-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let filter_cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                filter_cache,
            }),
        })
    }

    /// Base URL of the backend.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Build an endpoint URL from percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start a request with the API key and optional bearer token attached.
    fn request(&self, method: Method, url: Url, token: Option<&SecretString>) -> RequestBuilder {
        let mut builder = self.inner.client.request(method, url);
        if let Some(key) = &self.inner.api_key {
            builder = builder.header(API_KEY_HEADER, key.expose_secret());
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        builder
    }

    /// Send a request and decode a JSON body.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send_raw(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }

    /// Send a request whose body is not needed.
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.send_raw(request).await.map(|_| ())
    }

    /// Send a request and return the body of a successful response.
    async fn send_raw(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if !status.is_success() {
            let level_is_error = status.is_server_error();
            if level_is_error {
                tracing::error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Backend returned server error"
                );
            } else {
                tracing::debug!(status = %status, "Backend returned client error");
            }
            return Err(ApiError::from_status(status, &body));
        }

        Ok(body)
    }

    /// Readiness probe against the backend's health endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or unhealthy.
    pub async fn ping(&self) -> Result<(), ApiError> {
        let url = self.endpoint(&["health"])?;
        self.send_empty(self.request(Method::GET, url, None)).await
    }

    /// Distinct filter values for the inventory filters, cached for 5 minutes.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[tracing::instrument(skip(self, token))]
    pub async fn filter_options(
        &self,
        token: Option<&SecretString>,
    ) -> Result<FilterOptions, ApiError> {
        if let Some(options) = self.inner.filter_cache.get(&FILTER_OPTIONS_KEY).await {
            tracing::debug!("Cache hit for filter options");
            return Ok(options);
        }

        let url = self.endpoint(&["filter-options"])?;
        let payload: types::Payload<FilterOptions> =
            self.send(self.request(Method::GET, url, token)).await?;
        let options = payload.into_inner();

        self.inner
            .filter_cache
            .insert(FILTER_OPTIONS_KEY, options.clone())
            .await;
        Ok(options)
    }

    /// Drop cached filter options after an inventory change.
    fn invalidate_filter_options(&self) {
        self.inner.filter_cache.invalidate_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: Url::parse(base).unwrap(),
            api_key: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_segments() {
        let api = client("https://backend.example.com/v2/");
        let url = api.endpoint(&["api", "gems", "id with space"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://backend.example.com/v2/api/gems/id%20with%20space"
        );

        let api = client("http://localhost:4000");
        let url = api.endpoint(&["profile"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4000/profile");
    }

    #[test]
    fn test_error_mapping_from_status() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        match ApiError::from_status(StatusCode::NOT_FOUND, r#"{"message":"Gem not found"}"#) {
            ApiError::NotFound(message) => assert_eq!(message, "Gem not found"),
            other => panic!("unexpected {other:?}"),
        }
        match ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"error":"stockId taken"}"#) {
            ApiError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "stockId taken");
            }
            other => panic!("unexpected {other:?}"),
        }
        match ApiError::from_status(StatusCode::BAD_GATEWAY, "") {
            ApiError::Api { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_user_message_for_rate_limit() {
        assert_eq!(
            ApiError::RateLimited(30).user_message(),
            "Too many requests. Please wait 30 seconds and try again."
        );
    }
}
