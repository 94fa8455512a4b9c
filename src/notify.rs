//! Outbound webhook notifications
//!
//! Fire-and-forget posts to a Slack-style webhook. Delivery failures are
//! swallowed: a missed notification must never affect email processing.

use std::time::Duration;
use tracing::debug;

/// Webhook notifier; inert when disabled or unconfigured.
#[derive(Clone)]
pub struct Notifier {
    webhook_url: Option<String>,
    enabled: bool,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>, enabled: bool) -> Self {
        Self {
            webhook_url,
            enabled,
            client: reqwest::Client::new(),
        }
    }

    /// A notifier that never posts anywhere.
    pub fn disabled() -> Self {
        Self::new(None, false)
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.webhook_url.is_some()
    }

    /// Post a plain-text message; failures are logged at debug and dropped.
    pub async fn post(&self, text: &str) {
        let Some(url) = self.webhook_url.as_deref() else {
            return;
        };
        if !self.enabled {
            return;
        }

        let result = self
            .client
            .post(url)
            .timeout(Duration::from_secs(10))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await;

        if let Err(e) = result {
            debug!("webhook notification failed: {}", e);
        }
    }
}
