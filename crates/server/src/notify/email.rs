use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use xsshunter_core::User;

use super::{FireNotification, NotificationDelivery, NotificationSender, NotifyError};
use crate::config::{EmailConfig, EmailTlsMode};

const SENDER_NAME: &str = "email";

/// SMTP alerts addressed to the fire's owner.
pub struct EmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    subject_prefix: String,
}

impl EmailSender {
    pub fn from_config(config: &EmailConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| NotifyError::Email(format!("from address: {e}")))?;

        let mut builder = match config.tls {
            EmailTlsMode::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            }
            EmailTlsMode::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                    .map_err(|e| NotifyError::Email(e.to_string()))?
            }
            EmailTlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| NotifyError::Email(e.to_string()))?,
        };
        builder = builder
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            subject_prefix: config.subject_prefix.clone(),
        })
    }

    fn build_message(&self, notification: &FireNotification) -> Result<Message, String> {
        let to: Mailbox = notification
            .owner_email
            .parse()
            .map_err(|e| format!("owner address: {e}"))?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email_subject(&self.subject_prefix, &notification.url))
            .multipart(MultiPart::alternative_plain_html(
                render_email_text(notification),
                render_email_html(notification),
            ))
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl NotificationSender for EmailSender {
    fn name(&self) -> &str {
        SENDER_NAME
    }

    fn accepts(&self, owner: &User) -> bool {
        owner.send_email_alerts
    }

    async fn send(&self, notification: &FireNotification) -> NotificationDelivery {
        let message = match self.build_message(notification) {
            Ok(m) => m,
            Err(e) => return NotificationDelivery::failed(SENDER_NAME, e),
        };
        match self.transport.send(message).await {
            Ok(_) => NotificationDelivery::ok(SENDER_NAME),
            Err(e) => NotificationDelivery::failed(SENDER_NAME, e.to_string()),
        }
    }
}

pub fn email_subject(prefix: &str, url: &str) -> String {
    let subject = format!("XSS Payload Fired On {url}");
    if prefix.is_empty() {
        subject
    } else {
        format!("{prefix} {subject}")
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

pub fn render_email_text(n: &FireNotification) -> String {
    let mut out = format!(
        "{}\n\nURL: {}\nIP: {}\nReferer: {}\nUser-Agent: {}\nCookies: {}\nTitle: {}\nOrigin: {}\nIn iframe: {}\nSecrets found: {}\n",
        n.headline(),
        n.url,
        n.ip_address,
        n.referer,
        n.user_agent,
        n.cookies,
        n.title,
        n.origin,
        n.was_iframe,
        n.secret_count,
    );
    if let Some(url) = &n.screenshot_url {
        out.push_str(&format!("Screenshot: {url}\n"));
    }
    out.push_str(&format!("\nInjection request:\n{}\n", n.correlated_request));
    out
}

pub fn render_email_html(n: &FireNotification) -> String {
    let row = |label: &str, value: &str| {
        format!(
            "<tr><th align=\"left\">{}</th><td><code>{}</code></td></tr>\n",
            label,
            escape_html(value)
        )
    };

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html><body>\n");
    html.push_str(&format!("<h2>{}</h2>\n", escape_html(&n.headline())));
    html.push_str("<table cellpadding=\"4\">\n");
    html.push_str(&row("URL", &n.url));
    html.push_str(&row("IP Address", &n.ip_address));
    html.push_str(&row("Referer", &n.referer));
    html.push_str(&row("User Agent", &n.user_agent));
    html.push_str(&row("Cookies", &n.cookies));
    html.push_str(&row("Title", &n.title));
    html.push_str(&row("Origin", &n.origin));
    html.push_str(&row("In iframe", if n.was_iframe { "yes" } else { "no" }));
    html.push_str(&row("Browser time", &n.browser_timestamp.to_string()));
    html.push_str(&row("Secrets found", &n.secret_count.to_string()));
    html.push_str("</table>\n");

    if let Some(url) = &n.screenshot_url {
        let url = escape_html(url);
        html.push_str(&format!(
            "<h3>Screenshot</h3>\n<a href=\"{url}\"><img src=\"{url}\" width=\"600\"></a>\n"
        ));
    }

    html.push_str(&format!(
        "<h3>Injection Request</h3>\n<pre>{}</pre>\n",
        escape_html(&n.correlated_request)
    ));
    if let Some(dom) = &n.dom {
        html.push_str(&format!("<h3>DOM</h3>\n<pre>{}</pre>\n", escape_html(dom)));
    }
    if let Some(text) = &n.text {
        html.push_str(&format!("<h3>Page Text</h3>\n<pre>{}</pre>\n", escape_html(text)));
    }
    html.push_str("</body></html>\n");
    html
}
