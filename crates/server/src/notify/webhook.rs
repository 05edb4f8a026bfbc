use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{FireNotification, NotificationDelivery, NotificationSender, NotifyError};
use crate::config::{WebhookEndpointConfig, WebhookTemplate};

/// Render a notification into the format expected by the target platform.
pub fn render_template(template: WebhookTemplate, n: &FireNotification) -> serde_json::Value {
    match template {
        WebhookTemplate::Generic => render_generic(n),
        WebhookTemplate::Slack => render_slack(n),
        WebhookTemplate::Discord => render_discord(n),
    }
}

fn render_generic(n: &FireNotification) -> serde_json::Value {
    serde_json::json!({
        "event_type": "payload_fire",
        "payload_fire": n,
    })
}

fn render_slack(n: &FireNotification) -> serde_json::Value {
    let headline = n.headline();
    let mut fields = vec![
        serde_json::json!({"type": "mrkdwn", "text": format!("*IP:* {}", n.ip_address)}),
        serde_json::json!({"type": "mrkdwn", "text": format!("*Origin:* {}", n.origin)}),
        serde_json::json!({"type": "mrkdwn", "text": format!("*Secrets:* {}", n.secret_count)}),
    ];
    if let Some(url) = &n.screenshot_url {
        fields.push(serde_json::json!({"type": "mrkdwn", "text": format!("*Screenshot:* <{url}>")}));
    }

    serde_json::json!({
        "text": headline,
        "blocks": [
            {
                "type": "section",
                "text": {
                    "type": "plain_text",
                    "text": headline
                }
            },
            {
                "type": "section",
                "fields": fields
            }
        ]
    })
}

// Discord rejects embeds that break these limits.
const DISCORD_CONTENT_MAX: usize = 2000;
const DISCORD_TITLE_MAX: usize = 256;
const DISCORD_FIELD_MAX: usize = 1024;

fn render_discord(n: &FireNotification) -> serde_json::Value {
    let title = if n.title.trim().is_empty() {
        "Payload fire"
    } else {
        n.title.as_str()
    };
    let mut embed = serde_json::json!({
        "title": clip(title, DISCORD_TITLE_MAX),
        "color": 0xFF0000,
        "fields": [
            discord_field("IP", &n.ip_address),
            discord_field("Origin", &n.origin),
            discord_field("Secrets", &n.secret_count.to_string()),
        ],
    });
    if is_web_url(&n.url) {
        embed["url"] = serde_json::json!(n.url);
    }
    if let Some(url) = &n.screenshot_url {
        embed["image"] = serde_json::json!({ "url": url });
    }

    serde_json::json!({
        "content": clip(&n.headline(), DISCORD_CONTENT_MAX),
        "embeds": [embed]
    })
}

fn discord_field(name: &str, value: &str) -> serde_json::Value {
    let value = if value.trim().is_empty() { "-" } else { value };
    serde_json::json!({"name": name, "value": clip(value, DISCORD_FIELD_MAX), "inline": true})
}

fn is_web_url(raw: &str) -> bool {
    reqwest::Url::parse(raw)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Cut to at most `max` characters, marking the cut with an ellipsis.
fn clip(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut out: String = value.chars().take(max.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}

/// HTTP POST to one configured endpoint.
pub struct WebhookSender {
    config: WebhookEndpointConfig,
    client: Client,
}

impl WebhookSender {
    pub fn new(config: WebhookEndpointConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotifyError::Webhook(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn send(&self, notification: &FireNotification) -> NotificationDelivery {
        let body = render_template(self.config.template, notification);
        let mut req = self.client.post(&self.config.url).json(&body);
        for (key, value) in &self.config.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        match req.send().await {
            Ok(resp) if resp.status().is_success() => NotificationDelivery::ok(&self.config.name),
            Ok(resp) => NotificationDelivery::failed(
                &self.config.name,
                format!("HTTP {}", resp.status().as_u16()),
            ),
            Err(e) => NotificationDelivery::failed(&self.config.name, e.to_string()),
        }
    }
}
