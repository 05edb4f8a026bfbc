use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// HTML snapshot of a page the probe was told to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedPage {
    pub id: String,
    pub user_id: String,
    pub uri: String,
    pub html: Option<String>,
    pub created_at: DateTime<Utc>,
}
