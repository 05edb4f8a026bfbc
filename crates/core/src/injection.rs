use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single attempt to deliver a payload, registered ahead of time so the
/// resulting fire can be matched back to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionRequest {
    pub id: String,
    pub user_id: String,
    pub injection_key: String,
    pub request: String,
    pub created_at: DateTime<Utc>,
}

/// Result of registering an injection key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Created,
    /// The key was registered before; the first request text is kept.
    Conflict,
}

/// Body of `POST /api/v1/record_injection`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordInjectionRequest {
    pub request: String,
    pub owner_correlation_key: String,
    pub injection_key: String,
}
