//! Completion client abstraction
//!
//! Provides a common interface over the hosted completion API so the chat
//! session can be driven by the real `OpenAI` client or by a test double.

mod error;
mod models;
mod openai;
mod types;

#[cfg(test)]
mod proptests;

pub use error::{LlmError, LlmErrorKind};
pub use models::{all_models, token_limit, CHEAP_MODEL, DEFAULT_MODEL, EXPENSIVE_MODEL};
pub use openai::{LlmConfig, OpenAIService};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for completion providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// List the models offered by the endpoint
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError>;
}

/// Logging wrapper for completion services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        Self { inner }
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
                    model = %request.model,
                    user = request.user.as_deref().unwrap_or("-"),
                    duration_ms = %duration.as_millis(),
                    prompt_chars = request.prompt.chars().count(),
                    prompt_tokens = response.usage.prompt_tokens,
                    completion_tokens = response.usage.completion_tokens,
                    "Completion request finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    user = request.user.as_deref().unwrap_or("-"),
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Completion request failed"
                );
            }
        }

        result
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let result = self.inner.list_models().await;
        match &result {
            Ok(models) => tracing::debug!(count = models.len(), "Listed models"),
            Err(e) => tracing::warn!(error = %e.message, "Listing models failed"),
        }
        result
    }
}
