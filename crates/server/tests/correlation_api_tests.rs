//! Injection correlation and health endpoint tests
//!
//! - POST /api/v1/record_injection: 401 / 409 / 200
//! - A capture carrying a registered injection key picks up its request
//! - GET /health

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::{multipart_body, multipart_content_type, TestApp};
use serde_json::{json, Value};
use xsshunter_core::User;

fn with_correlation_key(app: &TestApp, owner: &User, key: &str) -> User {
    let mut owner = owner.clone();
    owner.correlation_key = Some(key.to_string());
    app.state.db.update_user_settings(&owner).unwrap();
    owner
}

#[tokio::test]
async fn test_record_injection_rejects_unknown_key() {
    let app = TestApp::new();
    let server = TestServer::new(app.router.clone()).unwrap();

    let response = server
        .post("/api/v1/record_injection")
        .json(&json!({
            "request": "GET /?q=<script>",
            "owner_correlation_key": "not-a-real-key",
            "injection_key": "inj-1"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_record_injection_conflicts_on_reuse() {
    let app = TestApp::new();
    let owner = app.create_user("owner@example.com");
    let key = "k".repeat(64);
    let owner = with_correlation_key(&app, &owner, &key);
    let server = TestServer::new(app.router.clone()).unwrap();

    let first = server
        .post("/api/v1/record_injection")
        .json(&json!({
            "request": "GET /search?q=first",
            "owner_correlation_key": key,
            "injection_key": "inj-1"
        }))
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);
    let body: Value = first.json();
    assert_eq!(body["success"], true);

    let second = server
        .post("/api/v1/record_injection")
        .json(&json!({
            "request": "GET /search?q=second",
            "owner_correlation_key": key,
            "injection_key": "inj-1"
        }))
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);
    let body: Value = second.json();
    assert_eq!(body["code"], "EXISTING_INJECTION_KEY");

    let stored = app
        .state
        .pipeline
        .correlation()
        .resolve("inj-1")
        .unwrap();
    assert_eq!(stored.as_deref(), Some("GET /search?q=first"));
    assert_eq!(owner.correlation_key.as_deref(), Some(key.as_str()));
}

#[tokio::test]
async fn test_record_injection_rejects_malformed_body() {
    let app = TestApp::new();
    let server = TestServer::new(app.router.clone()).unwrap();

    let response = server
        .post("/api/v1/record_injection")
        .json(&json!({ "request": "GET /" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_capture_is_matched_to_registered_injection() {
    let app = TestApp::new();
    let owner = app.create_user("owner@example.com");
    let key = "c".repeat(64);
    with_correlation_key(&app, &owner, &key);
    let server = TestServer::new(app.router.clone()).unwrap();

    server
        .post("/api/v1/record_injection")
        .json(&json!({
            "request": "POST /comment body=<script src=//x></script>",
            "owner_correlation_key": key,
            "injection_key": "inj-42"
        }))
        .await
        .assert_status_ok();

    let body = multipart_body(
        &[
            ("uri", "http://victim/comments"),
            ("path", owner.path.as_str()),
            ("injection_key", "inj-42"),
        ],
        None,
    );
    server
        .post("/js_callback")
        .content_type(&multipart_content_type())
        .bytes(body.into())
        .await
        .assert_status_ok();

    let fires = app.wait_for_fires(&owner, 1).await;
    assert!(fires[0].has_correlation());
    assert_eq!(
        fires[0].correlated_request,
        "POST /comment body=<script src=//x></script>"
    );
}

#[tokio::test]
async fn test_health_reports_components() {
    let app = TestApp::new();
    let server = TestServer::new(app.router.clone()).unwrap();

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"]["ok"], true);
    assert_eq!(body["storage"]["backend"], "local");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}
