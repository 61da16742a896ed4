//! Incoming-webhook notifier (Slack-compatible `{"text": ...}` payload).

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use self_healing_core::notify::{NoopNotifier, Notifier};

use crate::config::NotifyConfig;

pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            url: url.into(),
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        tracing::info!(status = status.as_u16(), "webhook notification sent");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("webhook returned {}: {}", status, body);
        }
        Ok(())
    }
}

/// A [`WebhookNotifier`] when a webhook URL is configured, else a no-op.
pub fn create_notifier(config: &NotifyConfig) -> Result<Arc<dyn Notifier>> {
    match config.webhook_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(Arc::new(WebhookNotifier::new(
            url,
            config.timeout_secs.map(Duration::from_secs),
        )?)),
        _ => {
            tracing::info!("no webhook configured; notifications disabled");
            Ok(Arc::new(NoopNotifier))
        }
    }
}
