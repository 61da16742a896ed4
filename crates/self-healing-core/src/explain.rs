//! Retrieval-augmented explanation of database errors.
//!
//! The [`Explainer`] stuffs retrieved passages into a system message as
//! context and sends the category prompt as the user question. Model failures
//! never escape [`Explainer::explain`]: they become a degraded explanation
//! that names the failure.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::completion::{ChatMessage, CompletionModel};
use crate::models::Passage;

/// System preamble placed ahead of the retrieved context.
const CONTEXT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Prefix of every degraded explanation.
pub const DEGRADED_PREFIX: &str = "Explanation unavailable:";

/// Composes retrieval-augmented requests against a [`CompletionModel`].
#[derive(Clone)]
pub struct Explainer {
    model: Arc<dyn CompletionModel>,
}

impl Explainer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<dyn CompletionModel> {
        &self.model
    }

    /// Build the message list sent to the model.
    pub fn compose(prompt: &str, passages: &[Passage]) -> Vec<ChatMessage> {
        let context = if passages.is_empty() {
            "(no similar past errors recorded)".to_string()
        } else {
            passages
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        vec![
            ChatMessage::system(format!(
                "{}\n----------------\n{}",
                CONTEXT_PREAMBLE, context
            )),
            ChatMessage::user(prompt),
        ]
    }

    /// Ask the model, propagating any failure.
    pub async fn try_explain(&self, prompt: &str, passages: &[Passage]) -> Result<String> {
        let messages = Self::compose(prompt, passages);
        debug!(
            model = self.model.model_name(),
            passages = passages.len(),
            "requesting explanation"
        );
        let reply = self.model.complete(&messages).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            anyhow::bail!("model returned an empty explanation");
        }
        Ok(reply.to_string())
    }

    /// Ask the model; a failure becomes a degraded explanation string.
    pub async fn explain(&self, prompt: &str, passages: &[Passage]) -> String {
        match self.try_explain(prompt, passages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "explanation failed");
                degraded_explanation(&e)
            }
        }
    }
}

/// Text used in place of an explanation when the model call fails.
pub fn degraded_explanation(err: &anyhow::Error) -> String {
    format!("{} {}", DEGRADED_PREFIX, err)
}
