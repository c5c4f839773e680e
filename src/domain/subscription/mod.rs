//! Subscription domain: plan, status, lifecycle and transitions.
//!
//! A user without a [`SubscriptionRecord`] is on the free plan. Records are
//! changed only through [`compute_transition`], which enforces the lifecycle
//! state machine for billing events and keeps administrative overrides on a
//! separate path.

mod billing_event;
mod errors;
mod lifecycle;
mod plan;
mod record;
mod status;
mod transition;
mod webhook_errors;
mod webhook_verifier;

pub use billing_event::{
    interpret, map_provider_status, BillingEvent, BillingEventData, BillingEventKind,
    SubscriberRef, WebhookInstruction,
};
pub use errors::SubscriptionError;
pub use lifecycle::LifecycleState;
pub use plan::{BillingInterval, Plan};
pub use record::{BillingRefs, SubscriptionRecord};
pub use status::SubscriptionStatus;
pub use transition::{
    compute_transition, PeriodEndPolicy, PlanTransition, TargetState, TransitionOutcome,
    TRIAL_DAYS,
};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{sign_for_tests, SignatureHeader, WebhookVerifier};

#[cfg(test)]
pub(crate) use record::fixtures;
