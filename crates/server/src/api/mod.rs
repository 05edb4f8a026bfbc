//! HTTP surface: public capture endpoints, correlation registration and the
//! session-protected admin API.

pub mod admin;
pub mod capture;
pub mod correlation;
pub mod middleware;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use xsshunter_core::{ErrorCode, ErrorReport};

use crate::health::health_handler;
use crate::probe::{probe_for_id, probe_root};
use crate::state::SharedState;

// ============================================================================
// Response envelope
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(result: T) -> Json<Self> {
        Json(Self {
            success: true,
            result: Some(result),
            error: None,
            code: None,
        })
    }
}

/// Error half of the envelope, with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            report: ErrorReport::new(code, message),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::InvalidRequest, message)
    }

    /// Logged in full; the client only sees a generic message.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "Request failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Internal,
            "internal error",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> ErrorCode {
        self.report.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            result: None,
            error: Some(self.report.message),
            code: Some(self.report.code),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<crate::db::DbError> for ApiError {
    fn from(err: crate::db::DbError) -> Self {
        Self::internal(err)
    }
}

impl From<crate::session::SessionError> for ApiError {
    fn from(err: crate::session::SessionError) -> Self {
        Self::internal(err)
    }
}

// ============================================================================
// Router
// ============================================================================

fn public_cors(methods: [Method; 2]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-requested-with")])
        .max_age(Duration::from_secs(86400))
}

pub fn build_router(state: SharedState) -> Router {
    let callbacks = Router::new()
        .route("/js_callback", post(capture::js_callback))
        .route("/page_callback", post(capture::page_callback))
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes))
        .layer(public_cors([Method::POST, Method::OPTIONS]));

    let probes = Router::new()
        .route("/", get(probe_root))
        .route("/:probe_id", get(probe_for_id))
        .layer(public_cors([Method::GET, Method::OPTIONS]));

    let mut app = Router::new()
        .route("/screenshots/:filename", get(capture::screenshot))
        .route("/health", get(health_handler))
        .route(
            "/api/v1/record_injection",
            post(correlation::record_injection),
        )
        .merge(callbacks)
        .merge(probes);

    if state.config.server.control_panel_enabled {
        app = app.merge(admin::router());
        if let Some(dir) = &state.config.server.admin_dist_dir {
            app = app.nest_service("/admin", ServeDir::new(dir));
        }
    } else {
        tracing::info!("Control panel disabled; serving capture endpoints only");
    }

    app.layer(axum::middleware::from_fn(middleware::lowercase_guard))
        .layer(axum::middleware::from_fn(middleware::api_content_security_policy))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("mode=block"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("deny"),
        ))
        .with_state(state)
}
