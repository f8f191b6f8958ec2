//! Mock model client for engine tests

use super::client::ModelClient;
use super::state::Turn;
use crate::llm::LlmError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Mock model client that returns queued replies
pub struct MockModelClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    default_reply: Option<String>,
    /// Every transcript the engine sent
    transcripts: Mutex<Vec<Vec<Turn>>>,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply: None,
            transcripts: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `reply` whenever the queue is empty
    pub fn with_default_reply(reply: impl Into<String>) -> Self {
        Self {
            default_reply: Some(reply.into()),
            ..Self::new()
        }
    }

    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_transcripts(&self) -> Vec<Vec<Turn>> {
        self.transcripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn generate(&self, transcript: &[Turn]) -> Result<Turn, LlmError> {
        self.transcripts.lock().unwrap().push(transcript.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply.map(Turn::assistant),
            None => self
                .default_reply
                .clone()
                .map(Turn::assistant)
                .ok_or_else(|| LlmError::network("No mock reply queued")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_model_client() {
        let mock = MockModelClient::new();
        mock.queue_reply("Hello");

        let turn = mock.generate(&[Turn::user("hi")]).await.unwrap();
        assert_eq!(turn, Turn::assistant("Hello"));

        // Queue exhausted
        assert!(mock.generate(&[Turn::user("again")]).await.is_err());
        assert_eq!(mock.recorded_transcripts().len(), 2);
    }

    #[tokio::test]
    async fn test_default_reply_used_after_queue() {
        let mock = MockModelClient::with_default_reply("fallback");
        mock.queue_error(LlmError::rate_limit("busy"));

        assert!(mock.generate(&[]).await.is_err());
        assert_eq!(mock.generate(&[]).await.unwrap().text, "fallback");
    }
}
