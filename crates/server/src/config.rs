//! Server configuration
//!
//! YAML file (optional) layered with `XSSHUNTER_*` environment overrides,
//! validated once at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid environment override {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Socket address to bind.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Public hostname the probe calls back to (no scheme).
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Serve the admin API and static UI.
    #[serde(default = "default_true")]
    pub control_panel_enabled: bool,

    /// Where screenshot uploads are spooled before compression.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Built admin UI to serve under `/admin`.
    #[serde(default)]
    pub admin_dist_dir: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            hostname: default_hostname(),
            control_panel_enabled: true,
            upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            admin_dist_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Screenshot storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Local {
        #[serde(default = "default_screenshot_dir")]
        dir: PathBuf,
    },
    Gcs {
        bucket: String,
        #[serde(default = "default_gcs_endpoint")]
        endpoint: String,
        /// Object key prefix, e.g. `screenshots/`.
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        access_token: Option<String>,
        #[serde(default = "default_gcs_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local {
            dir: default_screenshot_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Initial signing secret. A rotated secret stored in the database wins.
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default = "default_session_ttl_hours")]
    pub ttl_hours: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            ttl_hours: default_session_ttl_hours(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub webhooks: Vec<WebhookEndpointConfig>,
}

/// TLS mode for SMTP delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTlsMode {
    None,
    #[default]
    StartTls,
    Tls,
}

/// SMTP settings for fire alerts. The recipient is always the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub subject_prefix: String,
    pub tls: EmailTlsMode,
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: 587,
            username: None,
            password: None,
            from: String::new(),
            subject_prefix: "[XSS Hunter Express]".to_string(),
            tls: EmailTlsMode::StartTls,
            timeout_secs: 10,
        }
    }
}

/// Payload template for a chat webhook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookTemplate {
    #[default]
    Generic,
    Slack,
    Discord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpointConfig {
    pub name: String,
    pub url: String,

    #[serde(default)]
    pub template: WebhookTemplate,

    /// Static headers added to every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rolling log files. Stderr only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_upload_dir() -> PathBuf {
    std::env::temp_dir().join("xsshunter-uploads")
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("xsshunter")
}

fn default_database_path() -> PathBuf {
    data_dir().join("xsshunter.db")
}

fn default_screenshot_dir() -> PathBuf {
    data_dir().join("payload-fire-images")
}

fn default_gcs_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_gcs_timeout_secs() -> u64 {
    30
}

fn default_session_ttl_hours() -> u64 {
    24 * 30
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info,xsshunter_server=info".to_string()
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Env {
            var,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

impl ServerConfig {
    /// Load from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// File (if any), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `XSSHUNTER_*` overrides read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("XSSHUNTER_LISTEN") {
            self.server.listen = v;
        }
        if let Some(v) = lookup("XSSHUNTER_HOSTNAME") {
            self.server.hostname = v;
        }
        if let Some(v) = lookup("XSSHUNTER_DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("XSSHUNTER_SESSION_SECRET") {
            self.session.secret = Some(v);
        }
        if let Some(v) = lookup("XSSHUNTER_SMTP_PASSWORD") {
            self.notifications.email.password = Some(v);
        }
        if let Some(v) = lookup("XSSHUNTER_CONTROL_PANEL_ENABLED") {
            self.server.control_panel_enabled = parse_bool("XSSHUNTER_CONTROL_PANEL_ENABLED", &v)?;
        }
        if let Some(v) = lookup("XSSHUNTER_GCS_ACCESS_TOKEN") {
            match &mut self.storage {
                StorageConfig::Gcs { access_token, .. } => *access_token = Some(v),
                StorageConfig::Local { .. } => {
                    tracing::debug!("XSSHUNTER_GCS_ACCESS_TOKEN ignored for local storage");
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .listen
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid(format!("server.listen: {e}")))?;

        let hostname = self.server.hostname.trim();
        if hostname.is_empty() || hostname.contains("://") || hostname.contains('/') {
            return Err(ConfigError::Invalid(
                "server.hostname must be a bare host name".to_string(),
            ));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_upload_bytes must be > 0".to_string(),
            ));
        }

        if let StorageConfig::Gcs {
            bucket, endpoint, ..
        } = &self.storage
        {
            if bucket.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "storage.bucket must not be empty".to_string(),
                ));
            }
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::Invalid(
                    "storage.endpoint must be an http(s) URL".to_string(),
                ));
            }
        }

        if let Some(secret) = &self.session.secret {
            if secret.len() < 32 {
                return Err(ConfigError::Invalid(
                    "session.secret must be at least 32 characters".to_string(),
                ));
            }
        }

        self.notifications.email.validate()?;

        for (idx, hook) in self.notifications.webhooks.iter().enumerate() {
            if hook.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "notifications.webhooks[{idx}].name must not be empty"
                )));
            }
            if !hook.url.starts_with("http://") && !hook.url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "notifications.webhooks[{idx}].url must be an http(s) URL"
                )));
            }
        }

        Ok(())
    }

    /// Base URL the probe and screenshot links use.
    pub fn public_base_url(&self) -> String {
        format!("https://{}", self.server.hostname)
    }
}

impl EmailConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.smtp_host.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "notifications.email.smtp_host must not be empty".to_string(),
            ));
        }
        if self.smtp_port == 0 {
            return Err(ConfigError::Invalid(
                "notifications.email.smtp_port must be >= 1".to_string(),
            ));
        }
        if !looks_like_email(&self.from) {
            return Err(ConfigError::Invalid(
                "notifications.email.from must be a valid email address".to_string(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::Invalid(
                "notifications.email.username and password must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

fn looks_like_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}
