//! HandleBillingWebhookHandler - applies signed billing provider events.
//!
//! verify signature -> interpret event -> resolve user -> apply transition
//!
//! Acknowledged without change: unknown event types, provider statuses with
//! no lifecycle meaning, and transitions the state machine rejects. Store
//! failures are returned so the provider redelivers.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{
    interpret, PlanTransition, SubscriberRef, SubscriptionError, WebhookError,
    WebhookInstruction, WebhookVerifier,
};
use crate::ports::{Clock, SubscriptionStore};

use super::{ApplyPlanTransitionCommand, ApplyPlanTransitionHandler, TransitionActor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied {
        event_id: String,
        user_id: UserId,
        changed: bool,
    },
    Ignored {
        event_id: String,
        reason: String,
    },
}

pub struct HandleBillingWebhookHandler {
    /// `None` when no signing secret is configured.
    verifier: Option<WebhookVerifier>,
    subscriptions: Arc<dyn SubscriptionStore>,
    transitions: Arc<ApplyPlanTransitionHandler>,
    clock: Arc<dyn Clock>,
}

impl HandleBillingWebhookHandler {
    pub fn new(
        verifier: Option<WebhookVerifier>,
        subscriptions: Arc<dyn SubscriptionStore>,
        transitions: Arc<ApplyPlanTransitionHandler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            subscriptions,
            transitions,
            clock,
        }
    }

    pub async fn handle(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        let verifier = self.verifier.as_ref().ok_or(WebhookError::NotConfigured)?;
        let event = verifier
            .verify_and_parse(payload, signature, self.clock.now())
            .map_err(|e| {
                tracing::warn!(error = %e, "billing webhook rejected");
                e
            })?;

        tracing::info!(event_id = %event.id, event_type = %event.event_type, "billing webhook received");

        let (subscriber, target) = match interpret(&event)? {
            WebhookInstruction::Apply { subscriber, target } => (subscriber, target),
            WebhookInstruction::Ignore { reason } => {
                tracing::debug!(event_id = %event.id, reason = %reason, "billing webhook ignored");
                return Ok(WebhookOutcome::Ignored {
                    event_id: event.id,
                    reason,
                });
            }
        };

        let user_id = self.resolve(subscriber).await?;
        let cmd = ApplyPlanTransitionCommand {
            user_id: user_id.clone(),
            transition: PlanTransition::Billing(target),
            actor: TransitionActor::System,
        };

        match self.transitions.handle(cmd).await {
            Ok(outcome) => Ok(WebhookOutcome::Applied {
                event_id: event.id,
                user_id,
                changed: outcome.is_changed(),
            }),
            Err(SubscriptionError::InvalidTransition { reason }) => {
                tracing::warn!(event_id = %event.id, user_id = %user_id, reason = %reason, "billing event not applicable; acknowledged");
                Ok(WebhookOutcome::Ignored {
                    event_id: event.id,
                    reason,
                })
            }
            Err(SubscriptionError::StoreUnavailable(reason)) => {
                Err(WebhookError::StoreUnavailable(reason))
            }
            Err(SubscriptionError::ConfigurationMissing(_)) => Err(WebhookError::NotConfigured),
            Err(other) => Err(WebhookError::ParseError(other.to_string())),
        }
    }

    async fn resolve(&self, subscriber: SubscriberRef) -> Result<UserId, WebhookError> {
        match subscriber {
            SubscriberRef::User(user_id) => Ok(user_id),
            SubscriberRef::ProviderSubscription(subscription_id) => self
                .subscriptions
                .find_by_billing_subscription_id(&subscription_id)
                .await?
                .map(|record| record.user_id)
                .ok_or(WebhookError::UnknownSubscriber(subscription_id)),
        }
    }
}
