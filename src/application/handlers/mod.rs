//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations over ports.

pub mod assistant;
pub mod subscription;
pub mod usage;

pub use assistant::{
    DiagnosePhotoCommand, DiagnosePhotoHandler, SendChatMessageCommand, SendChatMessageHandler,
};
pub use subscription::{
    ActionQuota, ApplyPlanTransitionCommand, ApplyPlanTransitionHandler,
    GetSubscriptionStatusHandler, GetSubscriptionStatusQuery, HandleBillingWebhookHandler,
    SubscriptionStatusView, TransitionActor, WebhookOutcome,
};
pub use usage::{AdmissionError, AdmissionGate, ConsumeOutcome, UsageLedger};
