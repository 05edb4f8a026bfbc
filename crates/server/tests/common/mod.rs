//! Shared harness: in-memory database, temp-dir object store, router.

#![allow(dead_code)]

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use xsshunter_core::{NewPayloadFire, PageRequest, PayloadFire, User, NO_CORRELATED_REQUEST};
use xsshunter_server::config::ServerConfig;
use xsshunter_server::db::Database;
use xsshunter_server::notify::NotificationDispatcher;
use xsshunter_server::object_store::{LocalObjectStore, ObjectStore};
use xsshunter_server::state::{AppState, SharedState};
use xsshunter_server::build_router;

pub const BOUNDARY: &str = "xsshunterboundary7MA4YWxk";
pub const SESSION_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub struct TestApp {
    pub dir: TempDir,
    pub state: SharedState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalObjectStore::new(dir.path().join("screenshots")).unwrap());
        Self::with_store(dir, store)
    }

    pub fn with_store(dir: TempDir, store: Arc<dyn ObjectStore>) -> Self {
        let mut config = ServerConfig::default();
        config.server.hostname = "xss.example.com".to_string();
        config.server.upload_dir = dir.path().join("uploads");
        std::fs::create_dir_all(&config.server.upload_dir).unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        let state = AppState::new(
            config,
            db,
            store,
            NotificationDispatcher::default(),
            SESSION_SECRET.to_string(),
        );
        let router = build_router(state.clone());
        Self { dir, state, router }
    }

    pub fn create_user(&self, email: &str) -> User {
        self.state.db.create_user(email).unwrap()
    }

    pub fn session_cookie(&self, user: &User) -> String {
        let value = self.state.sessions.issue(&user.id).unwrap();
        format!("session={value}")
    }

    /// Ingestion runs detached from the request; poll until it lands.
    pub async fn wait_for_fires(&self, owner: &User, count: u64) -> Vec<PayloadFire> {
        for _ in 0..100 {
            let (fires, total) = self
                .state
                .db
                .list_fires(&owner.id, PageRequest::default())
                .unwrap();
            if total >= count {
                return fires;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {count} fires for {}", owner.email);
    }

    pub fn insert_fire(&self, owner: &User, url: &str, screenshot_id: Option<String>) -> String {
        let fire = NewPayloadFire {
            user_id: owner.id.clone(),
            url: url.to_string(),
            ip_address: "203.0.113.9".to_string(),
            referer: String::new(),
            user_agent: "Mozilla/5.0".to_string(),
            cookies: String::new(),
            title: "victim".to_string(),
            dom: None,
            text: None,
            origin: "http://victim".to_string(),
            screenshot_id,
            was_iframe: false,
            browser_timestamp: 1_700_000_000_000,
            cors: None,
            git_exposed: None,
            correlated_request: NO_CORRELATED_REQUEST.to_string(),
        };
        self.state.db.create_fire(&fire, &[]).unwrap()
    }
}

/// Hand-built `multipart/form-data` body. `file` is an optional
/// `(field name, bytes)` pair sent as `image/png`.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"shot.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// Smallest valid PNG (1x1, transparent).
pub const ONE_PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];
