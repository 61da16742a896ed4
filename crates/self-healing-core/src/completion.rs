//! Completion model abstraction.
//!
//! The explainer and the chat endpoint talk to a hosted language model only
//! through [`CompletionModel`]. The OpenAI-compatible client lives in the app
//! crate; tests substitute scripted fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One message of a chat-style completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A generative completion backend.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-3.5-turbo"`).
    fn model_name(&self) -> &str;

    /// Send `messages` and return the assistant's reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}
