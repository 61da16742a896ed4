//! Hosted completion models.
//!
//! [`OpenAIChat`] talks to any OpenAI-compatible `/chat/completions`
//! endpoint. [`DisabledModel`] fails every call, which the explainer turns
//! into a degraded explanation.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use self_healing_core::completion::{ChatMessage, CompletionModel};

use crate::config::LlmConfig;
use crate::embedding::OPENAI_DEFAULT_URL;
use crate::retry::post_json_with_retry;

pub struct DisabledModel;

#[async_trait]
impl CompletionModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        bail!("llm provider is disabled")
    }
}

pub struct OpenAIChat {
    model: String,
    temperature: f32,
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    /// Build from config, reading `OPENAI_API_KEY` from the environment.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
        });

        let json = post_json_with_retry(
            &self.client,
            &format!("{}/chat/completions", self.base_url),
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;

        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing choices[0].message.content"))
}

/// Build the model named by `config.provider`.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn CompletionModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> LlmConfig {
        LlmConfig {
            provider: "openai".to_string(),
            url: Some(url.to_string()),
            max_retries: 0,
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn test_complete_sends_model_and_temperature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "why?"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Because."}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = OpenAIChat::with_api_key(&config(&server.uri()), "sk-test").unwrap();
        let reply = model.complete(&[ChatMessage::user("why?")]).await.unwrap();
        assert_eq!(reply, "Because.");
    }

    #[tokio::test]
    async fn test_complete_surfaces_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("context length exceeded"))
            .mount(&server)
            .await;

        let model = OpenAIChat::with_api_key(&config(&server.uri()), "sk-test").unwrap();
        let err = model.complete(&[ChatMessage::user("x")]).await.unwrap_err();
        assert!(err.to_string().contains("context length exceeded"));
    }

    #[tokio::test]
    async fn test_disabled_model_errors() {
        let model = create_model(&LlmConfig::default()).unwrap();
        assert_eq!(model.model_name(), "disabled");
        assert!(model.complete(&[]).await.is_err());
    }

    #[test]
    fn test_parse_missing_content() {
        assert!(parse_chat_response(&serde_json::json!({"choices": []})).is_err());
    }
}
