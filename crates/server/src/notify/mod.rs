//! Fire notifications.
//!
//! Each configured channel is a [`NotificationSender`]. The dispatcher sends
//! to every sender that accepts the owner; failures are logged and dropped.

mod email;
mod webhook;

pub use email::{email_subject, render_email_html, render_email_text, EmailSender};
pub use webhook::{render_template, WebhookSender};

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use xsshunter_core::{NewPayloadFire, User};

use crate::config::NotificationsConfig;
use crate::object_store::ArtifactId;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid email configuration: {0}")]
    Email(String),

    #[error("invalid webhook configuration: {0}")]
    Webhook(String),
}

/// A recorded fire, as seen by notification channels.
#[derive(Debug, Clone, Serialize)]
pub struct FireNotification {
    pub fire_id: String,
    pub owner_email: String,
    pub url: String,
    pub ip_address: String,
    pub referer: String,
    pub user_agent: String,
    pub cookies: String,
    pub title: String,
    pub origin: String,
    pub was_iframe: bool,
    pub browser_timestamp: i64,
    pub correlated_request: String,
    pub screenshot_url: Option<String>,
    pub secret_count: usize,
    /// Too large for chat payloads; rendered in email only.
    #[serde(skip)]
    pub dom: Option<String>,
    #[serde(skip)]
    pub text: Option<String>,
}

impl FireNotification {
    pub fn new(
        fire_id: &str,
        fire: &NewPayloadFire,
        owner: &User,
        secret_count: usize,
        base_url: &str,
    ) -> Self {
        let screenshot_url = fire
            .screenshot_id
            .as_deref()
            .and_then(ArtifactId::parse)
            .map(|id| format!("{}/screenshots/{}", base_url, id.filename()));
        Self {
            fire_id: fire_id.to_string(),
            owner_email: owner.email.clone(),
            url: fire.url.clone(),
            ip_address: fire.ip_address.clone(),
            referer: fire.referer.clone(),
            user_agent: fire.user_agent.clone(),
            cookies: fire.cookies.clone(),
            title: fire.title.clone(),
            origin: fire.origin.clone(),
            was_iframe: fire.was_iframe,
            browser_timestamp: fire.browser_timestamp,
            correlated_request: fire.correlated_request.clone(),
            screenshot_url,
            secret_count,
            dom: fire.dom.clone(),
            text: fire.text.clone(),
        }
    }

    pub fn headline(&self) -> String {
        format!("XSS Payload Fired On {}", self.url)
    }
}

/// Outcome of one sender for one fire.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationDelivery {
    pub sender: String,
    pub success: bool,
    pub error: Option<String>,
}

impl NotificationDelivery {
    pub fn ok(sender: &str) -> Self {
        Self {
            sender: sender.to_string(),
            success: true,
            error: None,
        }
    }

    pub fn failed(sender: &str, error: impl Into<String>) -> Self {
        Self {
            sender: sender.to_string(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Async notification channel.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Identifier used in logs and delivery records.
    fn name(&self) -> &str;

    /// Whether this owner wants notifications from this channel.
    fn accepts(&self, _owner: &User) -> bool {
        true
    }

    async fn send(&self, notification: &FireNotification) -> NotificationDelivery;
}

#[derive(Default)]
pub struct NotificationDispatcher {
    senders: Vec<Box<dyn NotificationSender>>,
}

impl NotificationDispatcher {
    pub fn new(senders: Vec<Box<dyn NotificationSender>>) -> Self {
        Self { senders }
    }

    /// Only enabled channels are instantiated.
    pub fn from_config(config: &NotificationsConfig) -> Result<Self, NotifyError> {
        let mut senders: Vec<Box<dyn NotificationSender>> = Vec::new();
        if config.email.enabled {
            senders.push(Box::new(EmailSender::from_config(&config.email)?));
        }
        for endpoint in config.webhooks.iter().filter(|w| w.enabled) {
            senders.push(Box::new(WebhookSender::new(endpoint.clone())?));
        }
        Ok(Self { senders })
    }

    pub fn sender_count(&self) -> usize {
        self.senders.len()
    }

    /// Send to every accepting channel concurrently. Never retries.
    pub async fn dispatch(
        &self,
        notification: &FireNotification,
        owner: &User,
    ) -> Vec<NotificationDelivery> {
        let sends = self
            .senders
            .iter()
            .filter(|s| s.accepts(owner))
            .map(|s| s.send(notification));
        let deliveries = join_all(sends).await;

        for delivery in &deliveries {
            if delivery.success {
                tracing::debug!(
                    fire_id = %notification.fire_id,
                    sender = %delivery.sender,
                    "Notification delivered"
                );
            } else {
                tracing::warn!(
                    fire_id = %notification.fire_id,
                    sender = %delivery.sender,
                    error = delivery.error.as_deref().unwrap_or("unknown"),
                    "Notification delivery failed"
                );
            }
        }
        deliveries
    }
}
