use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use xsshunter_core::ErrorCode;

use super::ApiError;

pub const API_PREFIX: &str = "/api/";
const API_CSP: &str = "default-src 'none'; script-src 'none'";

/// Routing is case-sensitive; any path with uppercase characters is refused
/// outright instead of falling through to a probe id.
pub async fn lowercase_guard(req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if path.chars().any(|c| c.is_uppercase()) {
        return ApiError::new(StatusCode::UNAUTHORIZED, ErrorCode::WhyAreYouShouting, "No.")
            .into_response();
    }
    next.run(req).await
}

pub async fn api_content_security_policy(req: Request, next: Next) -> Response {
    let is_api = req.uri().path().starts_with(API_PREFIX);
    let mut resp = next.run(req).await;
    if is_api {
        resp.headers_mut().insert(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(API_CSP),
        );
    }
    resp
}
