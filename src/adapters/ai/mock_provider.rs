//! Mock assistant provider for tests.
//!
//! Replies are deterministic and echo the request, so tests can assert that
//! the output they got came from the call they made.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AssistantError, AssistantProvider, ChatReply, ChatRequest, Diagnosis, DiagnosisRequest,
};

pub const MOCK_MODEL: &str = "mock-assistant";

#[derive(Debug, Clone, Default)]
pub struct MockAssistantProvider {
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl MockAssistantProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// While set, every call fails with `Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of calls received, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), AssistantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AssistantError::Unavailable("mock provider failing".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AssistantProvider for MockAssistantProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, AssistantError> {
        self.enter().await?;
        Ok(ChatReply {
            content: format!("mock reply to: {}", request.message),
            model: MOCK_MODEL.to_string(),
        })
    }

    async fn diagnose(&self, request: DiagnosisRequest) -> Result<Diagnosis, AssistantError> {
        self.enter().await?;
        let summary = match request.notes {
            Some(notes) => format!("mock diagnosis ({})", notes),
            None => "mock diagnosis".to_string(),
        };
        Ok(Diagnosis {
            summary,
            model: MOCK_MODEL.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_message_and_counts_calls() {
        let provider = MockAssistantProvider::new();
        let reply = provider
            .chat(ChatRequest {
                history: vec![],
                message: "moss?".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(reply.content, "mock reply to: moss?");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn failing_toggle_is_shared_between_clones() {
        let provider = MockAssistantProvider::new();
        let handle = provider.clone();
        handle.set_failing(true);

        let result = provider
            .chat(ChatRequest {
                history: vec![],
                message: "hi".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AssistantError::Unavailable(_))));
        assert_eq!(handle.call_count(), 1);
    }
}
