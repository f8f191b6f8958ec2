//! LLM provider abstraction
//!
//! Provides a common interface over the hosted text-generation provider.

mod anthropic;
mod error;
mod types;

pub use anthropic::AnthropicService;
pub use error::{LlmError, LlmErrorKind};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Configuration for the LLM provider
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    pub model: Option<String>,
    /// Gateway URL; when set the gateway handles authentication
    pub gateway: Option<String>,
    pub max_tokens: Option<u32>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            model: std::env::var("ANTHROPIC_MODEL").ok(),
            gateway: std::env::var("LLM_GATEWAY").ok(),
            max_tokens: std::env::var("LLM_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Build the configured provider, wrapped with logging.
///
/// Returns `None` when no credential is available; callers treat that as a
/// permanent configuration state rather than a per-request failure.
pub fn build_service(config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
    // In gateway mode the gateway handles the actual authentication
    let api_key = if config.gateway.is_some() {
        "implicit".to_string()
    } else {
        config
            .anthropic_api_key
            .as_ref()
            .filter(|key| !key.is_empty())?
            .clone()
    };

    match AnthropicService::new(
        api_key,
        config.model_name().to_string(),
        config.gateway.as_deref(),
        config.max_tokens,
    ) {
        Ok(service) => Some(Arc::new(LoggingService::new(Arc::new(service)))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create LLM service");
            None
        }
    }
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    transient = e.kind.is_transient(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
