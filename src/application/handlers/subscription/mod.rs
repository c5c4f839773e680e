//! Subscription use cases: plan transitions, status, billing webhooks.

mod apply_plan_transition;
mod get_subscription_status;
mod handle_billing_webhook;

pub use apply_plan_transition::{
    ApplyPlanTransitionCommand, ApplyPlanTransitionHandler, TransitionActor,
};
pub use get_subscription_status::{
    ActionQuota, GetSubscriptionStatusHandler, GetSubscriptionStatusQuery, SubscriptionStatusView,
};
pub use handle_billing_webhook::{HandleBillingWebhookHandler, WebhookOutcome};
