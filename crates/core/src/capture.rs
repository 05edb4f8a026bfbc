//! Validation of the multipart form a probe posts to `/js_callback`.
//!
//! Every field arrives as untrusted text. The form is checked once here and
//! turned into a typed [`Capture`]; anything malformed is rejected before it
//! reaches storage.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fire::NewSecret;

// ============================================================================
// Field names
// ============================================================================

pub const FIELD_URI: &str = "uri";
pub const FIELD_COOKIES: &str = "cookies";
pub const FIELD_REFERRER: &str = "referrer";
pub const FIELD_USER_AGENT: &str = "user-agent";
pub const FIELD_BROWSER_TIME: &str = "browser-time";
pub const FIELD_ORIGIN: &str = "origin";
pub const FIELD_INJECTION_KEY: &str = "injection_key";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_TEXT: &str = "text";
pub const FIELD_DOM: &str = "dom";
pub const FIELD_WAS_IFRAME: &str = "was_iframe";
pub const FIELD_SECRETS: &str = "secrets";
pub const FIELD_CORS: &str = "CORS";
pub const FIELD_GIT_EXPOSED: &str = "gitExposed";
pub const FIELD_PATH: &str = "path";

/// Name of the optional file part carrying the PNG screenshot.
pub const FIELD_SCREENSHOT: &str = "screenshot";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("browser-time must be a non-negative integer, got {0:?}")]
    InvalidBrowserTime(String),

    #[error("was_iframe must be \"true\" or \"false\", got {0:?}")]
    InvalidIframeFlag(String),

    #[error("secrets must be a JSON array of {{secret_type, secret_value}}: {0}")]
    InvalidSecrets(String),
}

/// A validated capture, ready for the ingestion pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub uri: String,
    pub cookies: String,
    pub referrer: String,
    pub user_agent: String,
    pub browser_time: i64,
    pub origin: String,
    pub injection_key: String,
    pub title: String,
    pub text: Option<String>,
    pub dom: Option<String>,
    pub was_iframe: bool,
    pub secrets: Vec<NewSecret>,
    pub cors: Option<String>,
    pub git_exposed: Option<String>,
    /// Routing token of the identity this capture belongs to.
    pub path: String,
}

fn browser_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+$").expect("Invalid browser-time regex"))
}

impl Capture {
    /// Build a capture from the text parts of the form.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, CaptureError> {
        let text = |name: &str| fields.get(name).cloned().unwrap_or_default();
        let optional = |name: &str| fields.get(name).filter(|v| !v.is_empty()).cloned();

        let browser_time = match fields.get(FIELD_BROWSER_TIME) {
            None => 0,
            Some(raw) if raw.is_empty() => 0,
            Some(raw) => {
                if !browser_time_re().is_match(raw) {
                    return Err(CaptureError::InvalidBrowserTime(raw.clone()));
                }
                raw.parse::<i64>()
                    .map_err(|_| CaptureError::InvalidBrowserTime(raw.clone()))?
            }
        };

        let was_iframe = match fields.get(FIELD_WAS_IFRAME).map(String::as_str) {
            None | Some("") | Some("false") => false,
            Some("true") => true,
            Some(other) => return Err(CaptureError::InvalidIframeFlag(other.to_string())),
        };

        let secrets = match fields.get(FIELD_SECRETS) {
            None => Vec::new(),
            Some(raw) if raw.trim().is_empty() => Vec::new(),
            Some(raw) => parse_secrets(raw)?,
        };

        Ok(Self {
            uri: text(FIELD_URI),
            cookies: text(FIELD_COOKIES),
            referrer: text(FIELD_REFERRER),
            user_agent: text(FIELD_USER_AGENT),
            browser_time,
            origin: text(FIELD_ORIGIN),
            injection_key: text(FIELD_INJECTION_KEY),
            title: text(FIELD_TITLE),
            text: optional(FIELD_TEXT),
            dom: optional(FIELD_DOM),
            was_iframe,
            secrets,
            cors: optional(FIELD_CORS),
            git_exposed: optional(FIELD_GIT_EXPOSED),
            path: text(FIELD_PATH),
        })
    }
}

fn parse_secrets(raw: &str) -> Result<Vec<NewSecret>, CaptureError> {
    let secrets: Vec<NewSecret> =
        serde_json::from_str(raw).map_err(|e| CaptureError::InvalidSecrets(e.to_string()))?;
    if secrets.iter().any(|s| s.secret_type.is_empty()) {
        return Err(CaptureError::InvalidSecrets(
            "secret_type must not be empty".to_string(),
        ));
    }
    Ok(secrets)
}
