//! Model client seam between the engine and the LLM provider

use super::state::{Role, Turn};
use crate::llm::{LlmError, LlmMessage, LlmRequest, LlmService, SystemContent};
use async_trait::async_trait;
use std::sync::Arc;

/// Produces the next assistant turn for a transcript.
///
/// Implementations must not retry; a failed call is final for the turn.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, transcript: &[Turn]) -> Result<Turn, LlmError>;
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn generate(&self, transcript: &[Turn]) -> Result<Turn, LlmError> {
        (**self).generate(transcript).await
    }
}

/// Adapter to use an `LlmService` as a `ModelClient`
pub struct LlmModelClient {
    service: Arc<dyn LlmService>,
}

impl LlmModelClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ModelClient for LlmModelClient {
    async fn generate(&self, transcript: &[Turn]) -> Result<Turn, LlmError> {
        let request = build_request(transcript);
        let response = self.service.complete(&request).await?;

        let text = response.text();
        if text.trim().is_empty() {
            return Err(LlmError::unknown("Model returned no text content"));
        }
        Ok(Turn::assistant(text))
    }
}

/// Split a transcript into the provider's system prompt and message list
pub fn build_request(transcript: &[Turn]) -> LlmRequest {
    let mut system = Vec::new();
    let mut messages = Vec::with_capacity(transcript.len());

    for turn in transcript {
        match turn.role {
            Role::System => system.push(SystemContent::new(turn.text.clone())),
            Role::User => messages.push(LlmMessage::user(turn.text.clone())),
            Role::Assistant => messages.push(LlmMessage::assistant(turn.text.clone())),
        }
    }

    LlmRequest {
        system,
        messages,
        max_tokens: None,
    }
}
