//! End-to-end flows through the storefront router against a fake backend.
//!
//! Every test gets its own servers, so rate limiter buckets and sessions never
//! leak between tests. Auth routes allow a burst of 5 per client, so no test
//! makes more than that many `/auth/*` requests.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use gemvault_integration_tests::{GEM_ID, TestApp, location};
use reqwest::StatusCode;
use reqwest::header::SET_COOKIE;
use serde_json::Value;

// =============================================================================
// Ambient
// =============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::spawn().await;

    let health = app.get("/health").await;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.text().await.unwrap(), "ok");

    let ready = app.get("/health/ready").await;
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(app.backend.requests_to("/health").len(), 1);
}

#[tokio::test]
async fn test_pages_carry_security_headers_and_request_id() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/"))
        .header("x-request-id", "trace-42")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-request-id"], "trace-42");
    let csp = headers["content-security-policy"].to_str().unwrap();
    assert!(csp.contains("'nonce-"));
    assert!(csp.contains("default-src 'none'"));
}

#[tokio::test]
async fn test_content_pages_render_markdown() {
    let app = TestApp::spawn().await;

    let about = app.get("/about").await;
    assert_eq!(about.status(), StatusCode::OK);
    assert!(about.text().await.unwrap().contains("<h2"));

    assert_eq!(app.get("/pages/no-such-page").await.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Guards
// =============================================================================

#[tokio::test]
async fn test_anonymous_visitor_is_prompted_to_sign_in() {
    let app = TestApp::spawn().await;

    let response = app.get("/inventory").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response.text().await.unwrap();
    assert!(body.contains("/auth/login?next=%2Finventory"));

    // Nothing protected reaches the backend without a token.
    assert!(app.backend.requests_to("/api/gems").is_empty());
}

#[tokio::test]
async fn test_anonymous_session_endpoint() {
    let app = TestApp::spawn().await;

    let session: Value = app.get("/api/session").await.json().await.unwrap();
    assert_eq!(session["isAuthenticated"], false);
    assert_eq!(session["isAdmin"], false);
    assert!(session["user"].is_null());
}

#[tokio::test]
async fn test_pending_user_lands_on_suspended_page() {
    let app = TestApp::spawn().await;

    let login = app.sign_in("new@trade.example", "USER", "PENDING").await;
    assert_eq!(login.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&login), "/account/suspended");

    let inventory = app.get("/inventory").await;
    assert_eq!(inventory.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&inventory), "/account/suspended");

    let suspended = app.get("/account/suspended").await;
    assert_eq!(suspended.status(), StatusCode::OK);
    assert!(suspended.text().await.unwrap().contains("being reviewed"));
}

#[tokio::test]
async fn test_customer_cannot_open_staff_pages() {
    let app = TestApp::spawn().await;

    let login = app.sign_in("buyer@trade.example", "USER", "APPROVED").await;
    assert_eq!(location(&login), "/inventory");

    let admin = app.get("/admin/gems").await;
    assert_eq!(admin.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&admin), "/");
}

#[tokio::test]
async fn test_login_honours_safe_next_only() {
    let app = TestApp::spawn().await;
    app.backend.add_user("buyer@trade.example", "USER", "ACTIVE");

    let login = app
        .client
        .post(app.url("/auth/login"))
        .form(&[
            ("email", "buyer@trade.example"),
            ("password", gemvault_integration_tests::PASSWORD),
            ("next", "//evil.example/steal"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(location(&login), "/inventory");
}

#[tokio::test]
async fn test_wrong_password_redirects_back_with_error() {
    let app = TestApp::spawn().await;
    app.backend.add_user("buyer@trade.example", "USER", "ACTIVE");

    let login = app
        .client
        .post(app.url("/auth/login"))
        .form(&[("email", "buyer@trade.example"), ("password", "guess")])
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::SEE_OTHER);
    assert!(location(&login).starts_with("/auth/login?error=credentials"));

    let session: Value = app.get("/api/session").await.json().await.unwrap();
    assert_eq!(session["isAuthenticated"], false);
}

// =============================================================================
// Inventory
// =============================================================================

#[tokio::test]
async fn test_inventory_forwards_repeated_filter_keys() {
    let app = TestApp::spawn().await;
    app.sign_in("buyer@trade.example", "USER", "APPROVED").await;

    let page = app
        .get("/inventory?stoneType=Ruby&stoneType=Sapphire&minCarat=1.5")
        .await;
    assert_eq!(page.status(), StatusCode::OK);
    let body = page.text().await.unwrap();
    assert!(body.contains("SP-1042"));
    assert!(body.contains(r#"id="gem-table""#));

    let list = app.backend.requests_to("/api/gems");
    let query = list.last().unwrap().query.clone().unwrap_or_default();
    assert!(query.contains("stoneType=Ruby&stoneType=Sapphire"), "{query}");
    assert!(query.contains("minCarat=1.5"), "{query}");
}

#[tokio::test]
async fn test_table_action_updates_saved_query() {
    let app = TestApp::spawn().await;
    app.sign_in("buyer@trade.example", "USER", "APPROVED").await;
    app.get("/inventory?stoneType=Ruby").await;

    let table = app.get("/inventory/table?action=sort&field=carat").await;
    assert_eq!(table.status(), StatusCode::OK);
    let fragment = table.text().await.unwrap();
    assert!(fragment.contains(r#"id="gem-table""#));
    assert!(!fragment.contains("<html"));

    let list = app.backend.requests_to("/api/gems");
    let query = list.last().unwrap().query.clone().unwrap_or_default();
    assert!(query.contains("sortBy=carat"), "{query}");
    assert!(query.contains("stoneType=Ruby"), "{query}");
}

#[tokio::test]
async fn test_gem_detail_page() {
    let app = TestApp::spawn().await;
    app.sign_in("buyer@trade.example", "USER", "ACTIVE").await;

    let page = app.get(&format!("/inventory/{GEM_ID}")).await;
    assert_eq!(page.status(), StatusCode::OK);
    let body = page.text().await.unwrap();
    assert!(body.contains("Royal blue"));
    assert!(body.contains(&format!("/quotations/new?gem={GEM_ID}")));
}

/// Start a table request for `page` in the background.
fn request_page(
    app: &TestApp,
    client: &reqwest::Client,
    page: u32,
) -> tokio::task::JoinHandle<StatusCode> {
    let request = client.get(app.url(&format!("/inventory/table?action=page&page={page}")));
    tokio::spawn(async move { request.send().await.unwrap().status() })
}

#[tokio::test]
async fn test_newer_table_request_supersedes_older_in_same_session() {
    let app = TestApp::spawn().await;
    app.sign_in("buyer@trade.example", "USER", "APPROVED").await;
    app.backend.delay_page(2, Duration::from_millis(800));

    let older = request_page(&app, &app.client, 2);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let newer = request_page(&app, &app.client, 3);

    assert_eq!(older.await.unwrap(), StatusCode::NO_CONTENT);
    assert_eq!(newer.await.unwrap(), StatusCode::OK);
}

#[tokio::test]
async fn test_table_requests_from_other_devices_do_not_interfere() {
    let app = TestApp::spawn().await;
    let laptop = TestApp::new_client();
    let phone = TestApp::new_client();
    app.sign_in_with(&laptop, "buyer@trade.example", "USER", "APPROVED")
        .await;
    app.sign_in_with(&phone, "buyer@trade.example", "USER", "APPROVED")
        .await;
    app.backend.delay_page(2, Duration::from_millis(800));

    let slow = request_page(&app, &laptop, 2);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let fast = request_page(&app, &phone, 3);

    assert_eq!(fast.await.unwrap(), StatusCode::OK);
    assert_eq!(slow.await.unwrap(), StatusCode::OK);
}

// =============================================================================
// Logout
// =============================================================================

#[tokio::test]
async fn test_logout_clears_session_and_token_cookie() {
    let app = TestApp::spawn().await;
    app.sign_in("buyer@trade.example", "USER", "APPROVED").await;

    let before: Value = app.get("/api/session").await.json().await.unwrap();
    assert_eq!(before["isAuthenticated"], true);

    let logout = app.client.post(app.url("/auth/logout")).send().await.unwrap();
    assert_eq!(logout.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&logout), "/");
    let cleared = logout
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|c| c.starts_with("accessToken=") && c.contains("Max-Age=0"));
    assert!(cleared);
    assert_eq!(app.backend.requests_to("/api/auth/logout").len(), 1);

    let after: Value = app.get("/api/session").await.json().await.unwrap();
    assert_eq!(after["isAuthenticated"], false);
    assert_eq!(app.get("/inventory").await.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Admin
// =============================================================================

#[tokio::test]
async fn test_admin_lands_on_gem_table() {
    let app = TestApp::spawn().await;

    let login = app.sign_in("staff@gemvault.example", "ADMIN", "ACTIVE").await;
    assert_eq!(location(&login), "/admin/gems");

    let table = app.get("/admin/gems").await;
    assert_eq!(table.status(), StatusCode::OK);
    assert!(table.text().await.unwrap().contains("SP-1042"));
}

#[tokio::test]
async fn test_csv_export() {
    let app = TestApp::spawn().await;
    app.sign_in("staff@gemvault.example", "ADMIN", "ACTIVE").await;

    let export = app.get("/admin/gems/export.csv?stoneType=Sapphire").await;
    assert_eq!(export.status(), StatusCode::OK);
    assert!(
        export.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let csv = export.text().await.unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("Stock ID,Stone Type"));
    assert!(lines.next().unwrap().starts_with("SP-1042,Sapphire"));
}

#[tokio::test]
async fn test_oversized_upload_is_rejected_before_backend() {
    let app = TestApp::spawn().await;
    app.sign_in("staff@gemvault.example", "ADMIN", "ACTIVE").await;

    let big = vec![0_u8; 2 * 1024 * 1024 + 1];
    let form = reqwest::multipart::Form::new().text("kind", "images").part(
        "files",
        reqwest::multipart::Part::bytes(big)
            .file_name("huge.jpg")
            .mime_str("image/jpeg")
            .unwrap(),
    );
    let response = app
        .client
        .post(app.url(&format!("/admin/gems/{GEM_ID}/assets")))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with(&format!("/admin/gems/{GEM_ID}/edit?error=")));
    assert!(app.backend.requests_to("/api/gems/S3Bucket").is_empty());
    assert!(app.backend.requests_to(&format!("/api/gems/{GEM_ID}")).is_empty());
}

#[tokio::test]
async fn test_upload_links_new_urls_to_gem() {
    let app = TestApp::spawn().await;
    app.sign_in("staff@gemvault.example", "ADMIN", "ACTIVE").await;

    let form = reqwest::multipart::Form::new().text("kind", "images").part(
        "files",
        reqwest::multipart::Part::bytes(b"\xff\xd8\xff\xe0 jpeg".to_vec())
            .file_name("side.jpg")
            .mime_str("image/jpeg")
            .unwrap(),
    );
    let response = app
        .client
        .post(app.url(&format!("/admin/gems/{GEM_ID}/assets")))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(
        location(&response),
        format!("/admin/gems/{GEM_ID}/edit?notice=uploaded")
    );
    let uploads = app.backend.requests_to("/api/gems/S3Bucket/insert/images/SP-1042");
    assert_eq!(uploads.len(), 1);
    let updates: Vec<_> = app
        .backend
        .requests()
        .into_iter()
        .filter(|r| r.method == reqwest::Method::PUT)
        .collect();
    assert_eq!(updates.len(), 1);
}
