use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use xsshunter_core::{ErrorCode, RecordInjectionRequest, RecordOutcome};

use super::{ApiError, ApiResponse};
use crate::state::SharedState;

/// `POST /api/v1/record_injection`: register an injection attempt so a later
/// fire can be matched to it. Authenticated by the owner's correlation key.
pub async fn record_injection(
    State(state): State<SharedState>,
    payload: Result<Json<RecordInjectionRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let Json(body) = payload?;

    if body.injection_key.trim().is_empty() {
        return Err(ApiError::bad_request("injection_key must not be empty"));
    }

    let invalid_credentials = || {
        ApiError::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::InvalidCredentials,
            "Invalid authentication provided. Please provide a proper correlation API key.",
        )
    };
    if body.owner_correlation_key.is_empty() {
        return Err(invalid_credentials());
    }
    let owner = state
        .db
        .find_user_by_correlation_key(&body.owner_correlation_key)?
        .ok_or_else(invalid_credentials)?;

    match state
        .pipeline
        .correlation()
        .record(&owner.id, &body.injection_key, &body.request)?
    {
        RecordOutcome::Created => Ok(ApiResponse::ok(serde_json::json!({}))),
        RecordOutcome::Conflict => Err(ApiError::new(
            StatusCode::CONFLICT,
            ErrorCode::ExistingInjectionKey,
            "That injection key already exists. Injection keys must be unique.",
        )),
    }
}
