//! Mock implementations for testing
//!
//! These mocks let sessions and the relay run without network I/O.

use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService, ModelInfo};
use crate::transport::{ChannelError, ChannelResult, Reply, ReplySink};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

// ============================================================================
// Mock completion client
// ============================================================================

/// Mock completion client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    models: Vec<ModelInfo>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            models: ["text-ada-001", "text-curie-001", "text-davinci-003"]
                .into_iter()
                .map(|id| ModelInfo {
                    id: id.to_string(),
                    owned_by: Some("openai".to_string()),
                    created: None,
                })
                .collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a successful response carrying only `text`
    pub fn queue_text(&self, text: &str) {
        self.queue_response(LlmResponse::from_text(text));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        Ok(self.models.clone())
    }
}

// ============================================================================
// Mock reply sink
// ============================================================================

/// Sink that records deliveries and can be told to fail
#[derive(Default)]
pub struct RecordingSink {
    failures: Mutex<VecDeque<ChannelError>>,
    pub delivered: Mutex<Vec<(String, Reply)>>,
}

impl RecordingSink {
    /// Make the next delivery attempt fail with `error`
    pub fn fail_next(&self, error: ChannelError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn texts(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, reply)| match reply {
                Reply::Text(text) => text.clone(),
                Reply::Menu { prompt, .. } => prompt.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn deliver(&self, chat_id: &str, reply: &Reply) -> ChannelResult<()> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.delivered
            .lock()
            .unwrap()
            .push((chat_id.to_string(), reply.clone()));
        Ok(())
    }
}
