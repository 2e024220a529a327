//! Integration test harness for the Gem Vault storefront.
//!
//! Each test starts two servers on ephemeral ports:
//!
//! - a [`FakeBackend`] that answers the inventory API the storefront calls
//!   and records every request it receives
//! - the real storefront router ([`TestApp`]), configured to talk to it
//!
//! The [`TestApp::client`] keeps cookies and never follows redirects, so tests
//! can assert on `Location` headers and session behaviour directly.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p gemvault-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use gemvault_storefront::build_router;
use gemvault_storefront::config::{ApiConfig, SentryConfig, StorefrontConfig};
use gemvault_storefront::state::AppState;

/// Password every fake account accepts.
pub const PASSWORD: &str = "cut-and-polished";

/// Id of the single gem the fake backend serves.
pub const GEM_ID: &str = "65a1f0c2";

// =============================================================================
// Fake Backend
// =============================================================================

/// One request as seen by the fake backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
}

#[derive(Default)]
struct BackendState {
    /// Accounts by email.
    users: HashMap<String, Value>,
    requests: Vec<RecordedRequest>,
    /// Artificial latency for gem list requests, by `page` value.
    page_delays: HashMap<String, Duration>,
}

/// In-process stand-in for the inventory backend.
#[derive(Clone)]
pub struct FakeBackend {
    pub addr: SocketAddr,
    state: Arc<Mutex<BackendState>>,
}

/// A backend user record.
#[must_use]
pub fn user_json(email: &str, role: &str, status: &str) -> Value {
    json!({
        "_id": format!("u-{}", email.split('@').next().unwrap_or(email)),
        "email": email,
        "name": "Test Buyer",
        "role": role,
        "status": status,
        "kyc": { "companyName": "Facet & Co", "country": "BE" },
        "quotations": []
    })
}

/// The gem every list and lookup returns.
#[must_use]
pub fn gem_json() -> Value {
    json!({
        "_id": GEM_ID,
        "stockId": "SP-1042",
        "stoneType": "Sapphire",
        "color": "Royal blue",
        "shape": "Cushion",
        "carat": 2.31,
        "origin": "Sri Lanka",
        "certificate": "GRS",
        "price": 12400.0,
        "availability": true,
        "images": ["https://gems.s3.amazonaws.com/SP-1042/front.jpg"]
    })
}

impl FakeBackend {
    /// Start the fake backend on an ephemeral port.
    pub async fn spawn() -> Self {
        let state = Arc::new(Mutex::new(BackendState::default()));
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    /// Register an account that can sign in with [`PASSWORD`].
    pub fn add_user(&self, email: &str, role: &str, status: &str) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(email.to_string(), user_json(email, role, status));
    }

    /// Make gem list requests for `page` take `delay` to answer.
    pub fn delay_page(&self, page: u32, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .page_delays
            .insert(page.to_string(), delay);
    }

    /// Every request received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests whose path starts with `prefix`.
    #[must_use]
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.starts_with(prefix))
            .collect()
    }
}

type Shared = Arc<Mutex<BackendState>>;

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn page_delay(state: &Shared, query: Option<&str>) -> Option<Duration> {
    let (_, page) = url::form_urlencoded::parse(query?.as_bytes()).find(|(k, _)| k == "page")?;
    state.lock().unwrap().page_delays.get(page.as_ref()).copied()
}

fn bearer_user(state: &Shared, headers: &HeaderMap) -> Option<Value> {
    let token = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer token-")?;
    state.lock().unwrap().users.get(token).cloned()
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    state.lock().unwrap().requests.push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(String::from),
    });

    match (method, path.as_str()) {
        (Method::GET, "/health") => reply(StatusCode::OK, json!({ "status": "ok" })),
        (Method::POST, "/api/auth/login") => {
            let creds: Value = serde_json::from_slice(&body).unwrap_or_default();
            let email = creds["email"].as_str().unwrap_or_default().to_string();
            let user = state.lock().unwrap().users.get(&email).cloned();
            match user {
                Some(user) if creds["password"] == PASSWORD => reply(
                    StatusCode::OK,
                    json!({ "user": user, "accessToken": format!("token-{email}") }),
                ),
                _ => reply(
                    StatusCode::UNAUTHORIZED,
                    json!({ "message": "Invalid email or password" }),
                ),
            }
        }
        (Method::POST, "/api/auth/logout") => reply(StatusCode::OK, json!({ "message": "ok" })),
        (Method::GET, "/profile") => match bearer_user(&state, &headers) {
            Some(user) => reply(StatusCode::OK, json!({ "user": user })),
            None => reply(StatusCode::UNAUTHORIZED, json!({ "message": "Token expired" })),
        },
        (Method::GET, "/filter-options") => reply(
            StatusCode::OK,
            json!({ "stoneTypes": ["Ruby", "Sapphire"], "colors": ["Royal blue"] }),
        ),
        (Method::GET, "/api/gems" | "/api/gems/search") => {
            if let Some(delay) = page_delay(&state, uri.query()) {
                tokio::time::sleep(delay).await;
            }
            reply(
                StatusCode::OK,
                json!({ "data": [gem_json()], "pagination": { "total": 1 } }),
            )
        }
        (Method::GET | Method::PUT, p) if p == format!("/api/gems/{GEM_ID}") => {
            reply(StatusCode::OK, json!({ "data": gem_json() }))
        }
        (Method::POST, p) if p.starts_with("/api/gems/S3Bucket/insert/") => reply(
            StatusCode::OK,
            json!({ "urls": ["https://gems.s3.amazonaws.com/SP-1042/side.jpg"] }),
        ),
        (Method::GET, "/api/quotations/mine") => reply(StatusCode::OK, json!({ "data": [] })),
        _ => reply(StatusCode::NOT_FOUND, json!({ "message": "Not found" })),
    }
}

// =============================================================================
// Storefront
// =============================================================================

/// A running storefront wired to a [`FakeBackend`].
pub struct TestApp {
    pub addr: SocketAddr,
    pub backend: FakeBackend,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Start a fake backend and a storefront in front of it.
    pub async fn spawn() -> Self {
        let backend = FakeBackend::spawn().await;

        let config = StorefrontConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            base_url: "http://127.0.0.1".to_string(),
            api: ApiConfig {
                base_url: url::Url::parse(&format!("http://{}/", backend.addr)).unwrap(),
                api_key: None,
                timeout: Duration::from_secs(5),
            },
            profile_refresh: Duration::from_secs(3600),
            sentry: SentryConfig::default(),
        };
        let content_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../storefront/content");
        let state = AppState::new(config, &content_dir).unwrap();
        let app = build_router(state);

        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr,
            backend,
            client: Self::new_client(),
        }
    }

    /// A client with its own cookie jar, like a second browser.
    #[must_use]
    pub fn new_client() -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    /// Absolute URL for a storefront path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// GET a storefront path.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    /// Register `email` with the backend and sign in through the login form.
    ///
    /// Returns the login response (a redirect on success).
    pub async fn sign_in(&self, email: &str, role: &str, status: &str) -> reqwest::Response {
        self.sign_in_with(&self.client, email, role, status).await
    }

    /// Like [`TestApp::sign_in`], but through `client`'s cookie jar.
    pub async fn sign_in_with(
        &self,
        client: &reqwest::Client,
        email: &str,
        role: &str,
        status: &str,
    ) -> reqwest::Response {
        self.backend.add_user(email, role, status);
        client
            .post(self.url("/auth/login"))
            .form(&[("email", email), ("password", PASSWORD)])
            .send()
            .await
            .unwrap()
    }
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
