//! `/health` endpoint
//!
//! Reports database and object-store reachability. Does not require a
//! session and works with the control panel disabled.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::object_store::ObjectStore;
use crate::state::SharedState;

// ============================================================================
// Health Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `error`
    pub status: String,
    pub build: BuildInfo,
    pub database: ComponentHealth,
    pub storage: ComponentHealth,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    pub fn is_ok(&self) -> bool {
        self.database.ok && self.storage.ok
    }
}

// ============================================================================
// Health Check Implementation
// ============================================================================

pub async fn check_health(db: &Database, store: &dyn ObjectStore) -> HealthResponse {
    let database = match db.ping() {
        Ok(()) => ComponentHealth {
            ok: true,
            backend: Some("sqlite".to_string()),
            error: None,
        },
        Err(e) => ComponentHealth {
            ok: false,
            backend: Some("sqlite".to_string()),
            error: Some(e.to_string()),
        },
    };

    let storage = match store.health_check().await {
        Ok(()) => ComponentHealth {
            ok: true,
            backend: Some(store.backend_name().to_string()),
            error: None,
        },
        Err(e) => ComponentHealth {
            ok: false,
            backend: Some(store.backend_name().to_string()),
            error: Some(e.to_string()),
        },
    };

    let status = if database.ok && storage.ok { "ok" } else { "error" };

    HealthResponse {
        status: status.to_string(),
        build: BuildInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_sha: option_env!("GIT_SHA").map(String::from),
        },
        database,
        storage,
        checked_at: Utc::now(),
    }
}

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let report = check_health(&state.db, state.store.as_ref()).await;
    if report.is_ok() {
        (StatusCode::OK, Json(report))
    } else {
        tracing::warn!(
            database = ?report.database.error,
            storage = ?report.storage.error,
            "Health check failed"
        );
        (StatusCode::INTERNAL_SERVER_ERROR, Json(report))
    }
}
