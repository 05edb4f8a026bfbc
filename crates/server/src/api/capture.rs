//! Endpoints the probe script talks to. No authentication; every input is
//! attacker-controlled.

use axum::{
    extract::{multipart::Field, ConnectInfo, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path as FsPath;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use xsshunter_core::capture::{FIELD_PATH, FIELD_SCREENSHOT};
use xsshunter_core::Capture;

use super::ApiError;
use crate::object_store::ArtifactId;
use crate::pipeline::{InboundCapture, TempUpload};
use crate::state::SharedState;

fn accepted() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "success" }))
}

/// Stream a file part to `<upload_dir>/<uuid>.upload`. Empty parts are
/// treated as absent.
async fn spool_upload(dir: &FsPath, mut field: Field<'_>) -> Result<Option<TempUpload>, ApiError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(ApiError::internal)?;
    let path = dir.join(format!("{}.upload", Uuid::new_v4()));
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(ApiError::internal)?;
    let upload = TempUpload::new(path);

    let mut written = 0usize;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                written += chunk.len();
                if let Err(e) = file.write_all(&chunk).await {
                    upload.discard().await;
                    return Err(ApiError::internal(e));
                }
            }
            Ok(None) => break,
            Err(e) => {
                upload.discard().await;
                return Err(ApiError::bad_request(e.body_text()));
            }
        }
    }
    if let Err(e) = file.flush().await {
        upload.discard().await;
        return Err(ApiError::internal(e));
    }

    if written == 0 {
        upload.discard().await;
        return Ok(None);
    }
    Ok(Some(upload))
}

/// Text parts into a map; the screenshot part (if any) onto disk.
async fn read_form(
    multipart: &mut Multipart,
    upload_dir: &FsPath,
) -> Result<(HashMap<String, String>, Option<TempUpload>), ApiError> {
    let mut fields = HashMap::new();
    let mut screenshot: Option<TempUpload> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                if let Some(upload) = screenshot.take() {
                    upload.discard().await;
                }
                return Err(ApiError::bad_request(e.body_text()));
            }
        };
        let name = field.name().unwrap_or_default().to_string();

        if name == FIELD_SCREENSHOT {
            if let Some(previous) = screenshot.take() {
                previous.discard().await;
            }
            screenshot = spool_upload(upload_dir, field).await?;
            continue;
        }

        match field.text().await {
            Ok(value) => {
                fields.insert(name, value);
            }
            Err(e) => {
                if let Some(upload) = screenshot.take() {
                    upload.discard().await;
                }
                return Err(ApiError::bad_request(e.body_text()));
            }
        }
    }
    Ok((fields, screenshot))
}

/// `POST /js_callback`: validate, hand off to the pipeline, acknowledge.
pub async fn js_callback(
    State(state): State<SharedState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (fields, screenshot) = read_form(&mut multipart, &state.config.server.upload_dir).await?;

    let capture = match Capture::from_fields(&fields) {
        Ok(capture) => capture,
        Err(e) => {
            if let Some(upload) = screenshot {
                upload.discard().await;
            }
            tracing::debug!(error = %e, "Rejected malformed capture");
            return Err(ApiError::bad_request(e.to_string()));
        }
    };

    let remote_ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();

    // Detached: the browser gets its answer before anything is stored.
    drop(state.pipeline.spawn(InboundCapture {
        capture,
        screenshot,
        remote_ip,
    }));

    Ok(accepted())
}

/// `POST /page_callback`: store a page the probe fetched for its owner.
pub async fn page_callback(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (fields, stray) = read_form(&mut multipart, &state.config.server.upload_dir).await?;
    if let Some(upload) = stray {
        upload.discard().await;
    }

    let path = fields.get(FIELD_PATH).map(String::as_str).unwrap_or_default();
    let uri = fields.get("uri").map(String::as_str).unwrap_or_default();
    let html = fields.get("html").map(String::as_str).filter(|h| !h.is_empty());

    match state.db.find_user_by_path(path) {
        Ok(Some(owner)) => match state.db.create_collected_page(&owner.id, uri, html) {
            Ok(id) => tracing::info!(page_id = %id, owner_id = %owner.id, uri, "Collected page stored"),
            Err(e) => tracing::error!(owner_id = %owner.id, error = %e, "Failed to store collected page"),
        },
        Ok(None) => tracing::info!(path, "Collected page for unknown routing token dropped"),
        Err(e) => tracing::error!(error = %e, "Owner lookup failed; collected page dropped"),
    }

    Ok(accepted())
}

/// `GET /screenshots/:filename`: gzip bytes served as-is.
pub async fn screenshot(State(state): State<SharedState>, Path(filename): Path<String>) -> Response {
    let Some(id) = ArtifactId::from_filename(&filename) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.store.get(id).await {
        Ok(bytes) => {
            let mut resp = bytes.into_response();
            let headers = resp.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
            headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_static("private, max-age=0"),
            );
            resp
        }
        Err(e) if e.is_not_found() => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(screenshot_id = %id, error = %e, "Failed to read screenshot");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
