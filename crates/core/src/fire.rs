//! Payload fire records and their secrets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored in `correlated_request` when no injection attempt matched.
pub const NO_CORRELATED_REQUEST: &str = "No correlated request found for this injection.";

/// A credential or token the probe found on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSecret {
    pub secret_type: String,
    #[serde(default)]
    pub secret_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub id: String,
    pub payload_id: String,
    pub secret_type: String,
    pub secret_value: Option<String>,
}

/// Attributes of a fire before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayloadFire {
    pub user_id: String,
    pub url: String,
    pub ip_address: String,
    pub referer: String,
    pub user_agent: String,
    pub cookies: String,
    pub title: String,
    pub dom: Option<String>,
    pub text: Option<String>,
    pub origin: String,
    /// Artifact id of the screenshot. Written independently of the
    /// artifact itself, so it may briefly point at nothing.
    pub screenshot_id: Option<String>,
    pub was_iframe: bool,
    pub browser_timestamp: i64,
    pub cors: Option<String>,
    pub git_exposed: Option<String>,
    pub correlated_request: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadFire {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub ip_address: String,
    pub referer: String,
    pub user_agent: String,
    pub cookies: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub origin: String,
    pub screenshot_id: Option<String>,
    pub was_iframe: bool,
    pub browser_timestamp: i64,
    #[serde(rename = "CORS", skip_serializing_if = "Option::is_none")]
    pub cors: Option<String>,
    #[serde(rename = "gitExposed", skip_serializing_if = "Option::is_none")]
    pub git_exposed: Option<String>,
    pub correlated_request: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub secrets: Vec<Secret>,
}

impl PayloadFire {
    pub fn has_correlation(&self) -> bool {
        self.correlated_request != NO_CORRELATED_REQUEST
    }
}
