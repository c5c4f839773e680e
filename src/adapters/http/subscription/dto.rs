//! HTTP DTOs for subscription endpoints. All JSON is camelCase.

use serde::{Deserialize, Serialize};

use crate::application::handlers::{ActionQuota, SubscriptionStatusView, WebhookOutcome};
use crate::domain::entitlement::Quota;
use crate::domain::subscription::{BillingInterval, Plan, SubscriptionRecord, SubscriptionStatus};
use crate::domain::usage::MeteredAction;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /subscription/transition`.
///
/// Both shapes are parsed leniently as strings so that an unknown interval or
/// plan is reported as a 400 with a useful message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TransitionRequest {
    /// Admin override: `{userId, plan}`.
    #[serde(rename_all = "camelCase")]
    Override { user_id: String, plan: String },
    /// Self-service upgrade: `{interval}`.
    Upgrade { interval: String },
}

/// Body of `POST /subscription/cancel`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    #[serde(default)]
    pub at_period_end: bool,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounts {
    pub ai_chat_count: u32,
    pub photo_diagnosis_count: u32,
    /// First day of the current period, `YYYY-MM-DD`.
    pub period_start: String,
}

/// Per-action numbers. `null` means unbounded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionNumbers {
    pub ai_chat: Option<u32>,
    pub photo_diagnosis: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusResponse {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_interval: Option<BillingInterval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_end: Option<String>,
    pub cancel_at_period_end: bool,
    pub effective_plan: Plan,
    pub usage: UsageCounts,
    pub limits: ActionNumbers,
    pub remaining: ActionNumbers,
    /// True when a store could not be read and free-tier defaults were shown.
    pub degraded: bool,
}

fn per_action(
    view: &SubscriptionStatusView,
    pick: impl Fn(&ActionQuota) -> Quota,
) -> ActionNumbers {
    let get = |action| view.quota_for(action).and_then(|q| pick(q).as_option());
    ActionNumbers {
        ai_chat: get(MeteredAction::AiChat),
        photo_diagnosis: get(MeteredAction::PhotoDiagnosis),
    }
}

impl From<SubscriptionStatusView> for SubscriptionStatusResponse {
    fn from(view: SubscriptionStatusView) -> Self {
        let limits = per_action(&view, |q| q.limit);
        let remaining = per_action(&view, |q| q.remaining);
        Self {
            plan: view.plan,
            status: view.status,
            billing_interval: view.billing_interval,
            current_period_end: view.current_period_end.map(|t| t.to_rfc3339()),
            trial_end: view.trial_end.map(|t| t.to_rfc3339()),
            cancel_at_period_end: view.cancel_at_period_end,
            effective_plan: view.effective_plan,
            usage: UsageCounts {
                ai_chat_count: view.usage.ai_chat_count,
                photo_diagnosis_count: view.usage.photo_diagnosis_count,
                period_start: view.usage.period_start.format("%Y-%m-%d").to_string(),
            },
            limits,
            remaining,
            degraded: view.degraded,
        }
    }
}

/// The record after a transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecordResponse {
    pub user_id: String,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub billing_interval: Option<BillingInterval>,
    pub current_period_end: Option<String>,
    pub trial_end: Option<String>,
    pub cancel_at_period_end: bool,
    /// False when the request was already reflected in the stored record.
    pub changed: bool,
}

impl SubscriptionRecordResponse {
    pub fn new(record: SubscriptionRecord, changed: bool) -> Self {
        Self {
            user_id: record.user_id.to_string(),
            plan: record.plan,
            status: record.status,
            billing_interval: record.billing_interval,
            current_period_end: record.current_period_end.map(|t| t.to_rfc3339()),
            trial_end: record.trial_end.map(|t| t.to_rfc3339()),
            cancel_at_period_end: record.cancel_at_period_end,
            changed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        match outcome {
            WebhookOutcome::Applied { changed: true, .. } => Self {
                received: true,
                outcome: "applied",
                reason: None,
            },
            WebhookOutcome::Applied { changed: false, .. } => Self {
                received: true,
                outcome: "duplicate",
                reason: None,
            },
            WebhookOutcome::Ignored { reason, .. } => Self {
                received: true,
                outcome: "ignored",
                reason: Some(reason),
            },
        }
    }
}
