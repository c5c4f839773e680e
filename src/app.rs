//! Wires ports into handlers and handlers into the HTTP router.
//!
//! `main` builds [`AppDependencies`] from configuration; integration tests
//! build it from in-memory adapters.

use std::sync::Arc;

use axum::Router;

use crate::adapters::http::{api_router, AssistantAppState, BillingSettings, SubscriptionAppState};
use crate::application::handlers::{
    AdmissionGate, ApplyPlanTransitionHandler, DiagnosePhotoHandler, GetSubscriptionStatusHandler,
    HandleBillingWebhookHandler, SendChatMessageHandler, UsageLedger,
};
use crate::domain::subscription::WebhookVerifier;
use crate::domain::usage::FreeTierLimits;
use crate::ports::{AssistantProvider, Clock, SessionValidator, SubscriptionStore, UsageStore};

/// Everything the service needs from the outside world.
#[derive(Clone)]
pub struct AppDependencies {
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub usage: Arc<dyn UsageStore>,
    pub clock: Arc<dyn Clock>,
    pub assistant: Arc<dyn AssistantProvider>,
    pub sessions: Arc<dyn SessionValidator>,
    pub limits: FreeTierLimits,
    pub webhook_verifier: Option<WebhookVerifier>,
    pub billing: BillingSettings,
}

/// Builds the API router over the given dependencies.
pub fn build_router(deps: AppDependencies) -> Router {
    let ledger = Arc::new(UsageLedger::new(deps.usage.clone(), deps.clock.clone()));
    let gate = Arc::new(AdmissionGate::new(
        deps.subscriptions.clone(),
        ledger.clone(),
        deps.limits,
    ));
    let transitions = Arc::new(ApplyPlanTransitionHandler::new(
        deps.subscriptions.clone(),
        deps.clock.clone(),
    ));

    let subscription_state = SubscriptionAppState {
        subscriptions: deps.subscriptions.clone(),
        status: Arc::new(GetSubscriptionStatusHandler::new(
            deps.subscriptions.clone(),
            ledger,
            deps.limits,
        )),
        transitions: transitions.clone(),
        webhooks: Arc::new(HandleBillingWebhookHandler::new(
            deps.webhook_verifier,
            deps.subscriptions,
            transitions,
            deps.clock,
        )),
        billing: deps.billing,
    };

    let assistant_state = AssistantAppState {
        chat: Arc::new(SendChatMessageHandler::new(gate.clone(), deps.assistant.clone())),
        diagnose: Arc::new(DiagnosePhotoHandler::new(gate, deps.assistant)),
    };

    api_router(deps.sessions, subscription_state, assistant_state)
}
