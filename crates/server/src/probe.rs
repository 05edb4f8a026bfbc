//! Probe script served to injected pages.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use regex::{Captures, Regex};
use std::sync::OnceLock;
use xsshunter_core::User;

use crate::state::SharedState;

const PROBE_TEMPLATE: &str = include_str!("../assets/probe.js");

/// Fill in the probe template. Every substituted value is emitted as a JSON
/// literal so it cannot break out of the script.
pub fn render_probe(base_url: &str, probe_id: &str, owner: Option<&User>) -> String {
    let pages: &[String] = owner.map(|u| u.pages_to_collect.as_slice()).unwrap_or(&[]);
    let chainload = owner
        .and_then(|u| u.chainload_uri.as_deref())
        .unwrap_or_default();

    // One pass over the template, so inserted values are never rescanned.
    placeholder_regex()
        .replace_all(PROBE_TEMPLATE, |caps: &Captures| match &caps[0] {
            "\"[HOST_URL]\"" => to_json(base_url),
            "[COLLECT_PAGE_LIST_REPLACE_ME]" => to_json(pages),
            "[CHAINLOAD_REPLACE_ME]" => to_json(chainload),
            "[PROBE_ID]" => to_json(probe_id),
            other => other.to_string(),
        })
        .into_owned()
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#""\[HOST_URL\]"|\[COLLECT_PAGE_LIST_REPLACE_ME\]|\[CHAINLOAD_REPLACE_ME\]|\[PROBE_ID\]"#,
        )
        .expect("Invalid probe placeholder regex")
    })
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn javascript(body: String) -> Response {
    let mut resp = body.into_response();
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/javascript"),
    );
    resp
}

pub async fn probe_root(State(state): State<SharedState>) -> Response {
    javascript(render_probe(&state.config.public_base_url(), "", None))
}

pub async fn probe_for_id(
    State(state): State<SharedState>,
    Path(probe_id): Path<String>,
) -> Response {
    let owner = match state.db.find_user_by_path(&probe_id) {
        Ok(owner) => owner,
        Err(e) => {
            tracing::warn!(error = %e, "Probe owner lookup failed; serving defaults");
            None
        }
    };
    javascript(render_probe(
        &state.config.public_base_url(),
        &probe_id,
        owner.as_ref(),
    ))
}
