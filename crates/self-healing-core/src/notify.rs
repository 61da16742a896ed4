//! Chat notification abstraction and alert formatting.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Classification, ErrorEvent};

/// Outbound chat notifier. Callers treat every post as fire-and-forget.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post `text` to the chat channel.
    async fn notify(&self, text: &str) -> Result<()>;
}

/// A notifier that drops every message. Used when no webhook is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// Format the chat alert for one pipeline run.
///
/// Uses Slack-style mrkdwn: `*bold*`, inline code fences, and `<url|label>`
/// links.
pub fn format_alert(
    event: &ErrorEvent,
    classification: &Classification,
    explanation: &str,
    chatbot_url: Option<&str>,
) -> String {
    let mut text = format!(
        "*New Error* *[{}]* ```{}```\n*Category:* {} | *Severity:* {} | *Auto-fixable:* {}\n*Source:* {}\n*Explanation & Fix:* {}",
        event.code,
        event.raw_message,
        classification.category,
        classification.severity,
        if classification.auto_fixable { "yes" } else { "no" },
        event.source,
        explanation,
    );
    if let Some(url) = chatbot_url {
        text.push_str(&format!(
            "\n➡️  *Need more help?* <{}|Open the Self-Healing Chatbot>",
            url
        ));
    }
    text
}
