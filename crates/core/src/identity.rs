use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An owner of captures. Created by the external login flow (or the
/// `add-user` command); never hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,

    /// Routing token: the probe path segment that attributes a capture to
    /// this user. Unique across users.
    pub path: String,

    /// Key that authenticates calls to the correlation registration API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_key: Option<String>,

    /// Extra script the probe loads after it fires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chainload_uri: Option<String>,

    /// Same-origin pages the probe should fetch and send back.
    #[serde(default)]
    pub pages_to_collect: Vec<String>,

    pub send_email_alerts: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: String, email: String, path: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            path,
            correlation_key: None,
            chainload_uri: None,
            pages_to_collect: Vec::new(),
            send_email_alerts: true,
            created_at,
        }
    }
}
