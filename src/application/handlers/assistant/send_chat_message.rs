//! SendChatMessageHandler - one metered AI chat turn.

use std::sync::Arc;

use crate::application::handlers::usage::{AdmissionError, AdmissionGate, ConsumeOutcome};
use crate::domain::foundation::UserId;
use crate::domain::usage::MeteredAction;
use crate::ports::{AssistantError, AssistantProvider, ChatReply, ChatRequest, ChatTurn};

/// Longest message accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4_000;
/// Earlier turns forwarded to the provider; older ones are dropped.
pub const MAX_HISTORY_TURNS: usize = 20;

#[derive(Debug, Clone)]
pub struct SendChatMessageCommand {
    pub user_id: UserId,
    pub message: String,
    pub history: Vec<ChatTurn>,
}

pub struct SendChatMessageHandler {
    gate: Arc<AdmissionGate>,
    provider: Arc<dyn AssistantProvider>,
}

impl SendChatMessageHandler {
    pub fn new(gate: Arc<AdmissionGate>, provider: Arc<dyn AssistantProvider>) -> Self {
        Self { gate, provider }
    }

    pub async fn handle(
        &self,
        cmd: SendChatMessageCommand,
    ) -> Result<ConsumeOutcome<ChatReply>, AdmissionError<AssistantError>> {
        let message = cmd.message.trim();
        if message.is_empty() {
            return Err(AdmissionError::Action(AssistantError::InvalidRequest(
                "message is empty".to_string(),
            )));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AdmissionError::Action(AssistantError::InvalidRequest(format!(
                "message exceeds {} characters",
                MAX_MESSAGE_CHARS
            ))));
        }

        let skip = cmd.history.len().saturating_sub(MAX_HISTORY_TURNS);
        let request = ChatRequest {
            history: cmd.history.into_iter().skip(skip).collect(),
            message: message.to_string(),
        };

        let provider = self.provider.clone();
        self.gate
            .try_consume(&cmd.user_id, MeteredAction::AiChat, move || async move {
                provider.chat(request).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockAssistantProvider;
    use crate::adapters::memory::{InMemorySubscriptionStore, InMemoryUsageStore};
    use crate::adapters::FixedClock;
    use crate::application::handlers::usage::UsageLedger;
    use crate::domain::subscription::fixtures::ts;
    use crate::domain::usage::FreeTierLimits;

    fn handler(provider: MockAssistantProvider) -> SendChatMessageHandler {
        let ledger = Arc::new(UsageLedger::new(
            Arc::new(InMemoryUsageStore::new()),
            Arc::new(FixedClock::new(ts("2025-06-05T00:00:00Z"))),
        ));
        let gate = Arc::new(AdmissionGate::new(
            Arc::new(InMemorySubscriptionStore::new()),
            ledger,
            FreeTierLimits::new(2, 1),
        ));
        SendChatMessageHandler::new(gate, Arc::new(provider))
    }

    fn cmd(message: &str) -> SendChatMessageCommand {
        SendChatMessageCommand {
            user_id: UserId::new("user-1").unwrap(),
            message: message.to_string(),
            history: vec![],
        }
    }

    #[tokio::test]
    async fn counts_each_successful_turn_until_limit() {
        let provider = MockAssistantProvider::new();
        let handler = handler(provider.clone());

        let first = handler.handle(cmd("when to overseed?")).await.unwrap();
        assert_eq!(first.output.content, "mock reply to: when to overseed?");
        assert_eq!(first.new_count, 1);

        handler.handle(cmd("and fertilize?")).await.unwrap();
        let third = handler.handle(cmd("one more")).await;

        assert!(matches!(third, Err(AdmissionError::LimitReached { limit: 2, .. })));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn blank_message_never_reaches_gate_or_provider() {
        let provider = MockAssistantProvider::new();
        let handler = handler(provider.clone());

        let result = handler.handle(cmd("   ")).await;
        assert!(matches!(
            result,
            Err(AdmissionError::Action(AssistantError::InvalidRequest(_)))
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_is_free() {
        let provider = MockAssistantProvider::new();
        provider.set_failing(true);
        let handler = handler(provider.clone());

        assert!(matches!(
            handler.handle(cmd("hello")).await,
            Err(AdmissionError::Action(AssistantError::Unavailable(_)))
        ));

        provider.set_failing(false);
        let ok = handler.handle(cmd("hello again")).await.unwrap();
        assert_eq!(ok.new_count, 1);
    }
}
