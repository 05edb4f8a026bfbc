//! Control-panel API. Every route except `auth-check` requires an
//! [`AdminUser`] (CSRF header plus a valid session cookie).

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use xsshunter_core::{
    token, CollectedPage, OwnerSettings, PageRequest, PayloadFire, SettingsUpdate,
};

use super::{ApiError, ApiResponse};
use crate::pipeline::PurgeReport;
use crate::session::{cookie_value, AdminUser, SESSION_COOKIE, SESSION_SECRET_SETTING};
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/auth-check", get(auth_check))
        .route(
            "/api/v1/payloadfires",
            get(list_payload_fires).delete(delete_payload_fires),
        )
        .route(
            "/api/v1/collected_pages",
            get(list_collected_pages).delete(delete_collected_pages),
        )
        .route("/api/v1/settings", get(get_settings).put(put_settings))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    page: Option<String>,
    limit: Option<String>,
}

impl ListQuery {
    fn page_request(&self) -> PageRequest {
        PageRequest::from_query(self.page.as_deref(), self.limit.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteIds {
    ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    is_authenticated: bool,
}

#[derive(Debug, Serialize)]
pub struct PayloadFirePage {
    payload_fires: Vec<PayloadFire>,
    total: u64,
}

#[derive(Debug, Serialize)]
pub struct CollectedPagePage {
    collected_pages: Vec<CollectedPage>,
    total: u64,
}

#[derive(Debug, Serialize)]
pub struct DeletedCount {
    deleted: usize,
}

async fn auth_check(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Json<ApiResponse<AuthStatus>> {
    let is_authenticated = cookie_value(&headers, SESSION_COOKIE)
        .and_then(|value| state.sessions.verify(value).ok())
        .and_then(|user_id| state.db.find_user_by_id(&user_id).ok().flatten())
        .is_some();
    ApiResponse::ok(AuthStatus { is_authenticated })
}

async fn list_payload_fires(
    AdminUser(user): AdminUser,
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PayloadFirePage>>, ApiError> {
    let (payload_fires, total) = state.db.list_fires(&user.id, query.page_request())?;
    Ok(ApiResponse::ok(PayloadFirePage {
        payload_fires,
        total,
    }))
}

async fn delete_payload_fires(
    AdminUser(user): AdminUser,
    State(state): State<SharedState>,
    payload: Result<Json<DeleteIds>, JsonRejection>,
) -> Result<Json<ApiResponse<PurgeReport>>, ApiError> {
    let Json(body) = payload?;
    let report = state.pipeline.purge_fires(&user.id, &body.ids).await?;
    Ok(ApiResponse::ok(report))
}

async fn list_collected_pages(
    AdminUser(user): AdminUser,
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<CollectedPagePage>>, ApiError> {
    let (collected_pages, total) = state
        .db
        .list_collected_pages(&user.id, query.page_request())?;
    Ok(ApiResponse::ok(CollectedPagePage {
        collected_pages,
        total,
    }))
}

async fn delete_collected_pages(
    AdminUser(user): AdminUser,
    State(state): State<SharedState>,
    payload: Result<Json<DeleteIds>, JsonRejection>,
) -> Result<Json<ApiResponse<DeletedCount>>, ApiError> {
    let Json(body) = payload?;
    let deleted = state.db.delete_collected_pages(&user.id, &body.ids)?;
    Ok(ApiResponse::ok(DeletedCount { deleted }))
}

async fn get_settings(AdminUser(user): AdminUser) -> Json<ApiResponse<OwnerSettings>> {
    ApiResponse::ok(OwnerSettings::from(&user))
}

async fn put_settings(
    AdminUser(mut user): AdminUser,
    State(state): State<SharedState>,
    payload: Result<Json<SettingsUpdate>, JsonRejection>,
) -> Result<Json<ApiResponse<OwnerSettings>>, ApiError> {
    let Json(update) = payload?;
    update
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    update.apply_to(&mut user);
    if update.wants_new_correlation_key() {
        user.correlation_key = Some(token::new_secret());
    }
    if update.wants_new_path() {
        user.path = token::new_path_token();
    }
    state.db.update_user_settings(&user)?;

    if update.wants_session_rotation() {
        state.sessions.rotate(|secret| {
            state
                .db
                .put_setting(SESSION_SECRET_SETTING, secret)
                .map_err(ApiError::from)
        })?;
        tracing::info!(owner_id = %user.id, "Session secret rotated; all sessions revoked");
    }

    Ok(ApiResponse::ok(OwnerSettings::from(&user)))
}
