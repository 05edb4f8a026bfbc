//! Per-owner settings exposed through the admin API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::User;

pub const MAX_CHAINLOAD_URI_LEN: usize = 4096;
pub const MAX_PAGES_TO_COLLECT: usize = 100;

/// Settings view returned by `GET /api/v1/settings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSettings {
    /// Empty until the owner generates one.
    pub correlation_api_key: String,
    pub chainload_uri: String,
    pub pages_to_collect: Vec<String>,
    pub send_alert_emails: bool,
    /// Probe routing token, shown so the owner can build payload URLs.
    pub path: String,
}

impl From<&User> for OwnerSettings {
    fn from(user: &User) -> Self {
        Self {
            correlation_api_key: user.correlation_key.clone().unwrap_or_default(),
            chainload_uri: user.chainload_uri.clone().unwrap_or_default(),
            pages_to_collect: user.pages_to_collect.clone(),
            send_alert_emails: user.send_email_alerts,
            path: user.path.clone(),
        }
    }
}

/// Body of `PUT /api/v1/settings`. Every field is optional; absent fields
/// leave the current value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsUpdate {
    /// `true` generates a fresh correlation API key.
    #[serde(default)]
    pub correlation_api_key: Option<bool>,
    /// `true` generates a fresh probe routing token.
    #[serde(default)]
    pub regenerate_path: Option<bool>,
    /// An empty string clears the chainload URI.
    #[serde(default)]
    pub chainload_uri: Option<String>,
    #[serde(default)]
    pub send_alert_emails: Option<bool>,
    #[serde(default)]
    pub pages_to_collect: Option<Vec<String>>,
    /// Any value rotates the deployment session secret.
    #[serde(default)]
    pub revoke_all_sessions: Option<bool>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("chainload_uri exceeds {MAX_CHAINLOAD_URI_LEN} bytes")]
    ChainloadTooLong,

    #[error("at most {MAX_PAGES_TO_COLLECT} pages can be collected")]
    TooManyPages,

    #[error("pages_to_collect entries must be non-empty without whitespace: {0:?}")]
    InvalidPage(String),
}

impl SettingsUpdate {
    /// Check the update once at the boundary.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(uri) = &self.chainload_uri {
            if uri.len() > MAX_CHAINLOAD_URI_LEN {
                return Err(SettingsError::ChainloadTooLong);
            }
        }
        if let Some(pages) = &self.pages_to_collect {
            if pages.len() > MAX_PAGES_TO_COLLECT {
                return Err(SettingsError::TooManyPages);
            }
            if let Some(bad) = pages
                .iter()
                .find(|p| p.is_empty() || p.chars().any(char::is_whitespace))
            {
                return Err(SettingsError::InvalidPage(bad.clone()));
            }
        }
        Ok(())
    }

    pub fn wants_new_correlation_key(&self) -> bool {
        self.correlation_api_key == Some(true)
    }

    pub fn wants_new_path(&self) -> bool {
        self.regenerate_path == Some(true)
    }

    pub fn wants_session_rotation(&self) -> bool {
        self.revoke_all_sessions.is_some()
    }

    /// Apply the plain value fields to `user`. Key and token regeneration
    /// is left to the caller, which owns the random source.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(uri) = &self.chainload_uri {
            user.chainload_uri = if uri.is_empty() {
                None
            } else {
                Some(uri.clone())
            };
        }
        if let Some(flag) = self.send_alert_emails {
            user.send_email_alerts = flag;
        }
        if let Some(pages) = &self.pages_to_collect {
            user.pages_to_collect = pages.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user() -> User {
        User::new(
            "u1".to_string(),
            "owner@example.com".to_string(),
            "abc123xyz0".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn test_empty_update_changes_nothing() {
        let mut u = user();
        let before = u.clone();
        let update: SettingsUpdate = serde_json::from_str("{}").unwrap();
        update.validate().unwrap();
        update.apply_to(&mut u);
        assert_eq!(u, before);
        assert!(!update.wants_session_rotation());
    }

    #[test]
    fn test_apply_values() {
        let mut u = user();
        let update: SettingsUpdate = serde_json::from_str(
            r#"{"chainload_uri":"https://cdn.example/x.js","send_alert_emails":false,"pages_to_collect":["/admin"]}"#,
        )
        .unwrap();
        update.validate().unwrap();
        update.apply_to(&mut u);

        let view = OwnerSettings::from(&u);
        assert_eq!(view.chainload_uri, "https://cdn.example/x.js");
        assert!(!view.send_alert_emails);
        assert_eq!(view.pages_to_collect, vec!["/admin".to_string()]);
        assert_eq!(view.correlation_api_key, "");
    }

    #[test]
    fn test_rejects_unknown_and_invalid_fields() {
        assert!(serde_json::from_str::<SettingsUpdate>(r#"{"password":"x"}"#).is_err());

        let update = SettingsUpdate {
            pages_to_collect: Some(vec!["/ok".to_string(), "has space".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            update.validate(),
            Err(SettingsError::InvalidPage("has space".to_string()))
        );
    }

    #[test]
    fn test_revoke_flag_rotates_regardless_of_value() {
        let update: SettingsUpdate =
            serde_json::from_str(r#"{"revoke_all_sessions":false}"#).unwrap();
        assert!(update.wants_session_rotation());
    }
}
