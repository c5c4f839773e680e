//! GetSubscriptionStatusHandler - query handler behind the status endpoint.
//!
//! Never fails. A store outage shows the caller free-tier defaults and zero
//! usage, flagged as degraded.

use std::sync::Arc;

use crate::application::handlers::usage::UsageLedger;
use crate::domain::entitlement::{evaluate, EffectiveTier, Quota};
use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{BillingInterval, Plan, SubscriptionRecord, SubscriptionStatus};
use crate::domain::usage::{FreeTierLimits, MeteredAction, UsageRecord};
use crate::ports::SubscriptionStore;

#[derive(Debug, Clone)]
pub struct GetSubscriptionStatusQuery {
    pub user_id: UserId,
}

/// Quota standing for one metered action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionQuota {
    pub action: MeteredAction,
    pub used: u32,
    pub limit: Quota,
    pub remaining: Quota,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionStatusView {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub billing_interval: Option<BillingInterval>,
    pub current_period_end: Option<Timestamp>,
    pub trial_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    /// What the user is actually entitled to; a past-due pro record is free.
    pub effective_plan: Plan,
    pub usage: UsageRecord,
    pub quotas: Vec<ActionQuota>,
    /// True when a store read failed and defaults were substituted.
    pub degraded: bool,
}

impl SubscriptionStatusView {
    pub fn quota_for(&self, action: MeteredAction) -> Option<&ActionQuota> {
        self.quotas.iter().find(|q| q.action == action)
    }
}

pub struct GetSubscriptionStatusHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    ledger: Arc<UsageLedger>,
    limits: FreeTierLimits,
}

impl GetSubscriptionStatusHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        ledger: Arc<UsageLedger>,
        limits: FreeTierLimits,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
            limits,
        }
    }

    pub async fn handle(&self, query: GetSubscriptionStatusQuery) -> SubscriptionStatusView {
        let user_id = &query.user_id;
        let mut degraded = false;

        let subscription = match self.subscriptions.get_subscription(user_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "subscription read failed; showing free tier");
                degraded = true;
                None
            }
        };

        let usage = match self.ledger.get_current_usage(user_id).await {
            Ok(usage) => usage,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "usage read failed; showing zero usage");
                degraded = true;
                UsageRecord::zero(user_id.clone(), self.ledger.current_period())
            }
        };

        self.view(subscription.as_ref(), usage, degraded)
    }

    fn view(
        &self,
        subscription: Option<&SubscriptionRecord>,
        usage: UsageRecord,
        degraded: bool,
    ) -> SubscriptionStatusView {
        let quotas = MeteredAction::ALL
            .iter()
            .map(|&action| {
                let decision = evaluate(subscription, &usage, &self.limits, action);
                ActionQuota {
                    action,
                    used: decision.current_count,
                    limit: decision.limit,
                    remaining: decision.remaining,
                }
            })
            .collect();

        let effective_plan = EffectiveTier::of(subscription).plan();

        match subscription {
            Some(record) => SubscriptionStatusView {
                plan: record.plan,
                status: record.status,
                billing_interval: record.billing_interval,
                current_period_end: record.current_period_end,
                trial_end: record.trial_end,
                cancel_at_period_end: record.cancel_at_period_end,
                effective_plan,
                usage,
                quotas,
                degraded,
            },
            None => SubscriptionStatusView {
                plan: Plan::Free,
                status: SubscriptionStatus::Active,
                billing_interval: None,
                current_period_end: None,
                trial_end: None,
                cancel_at_period_end: false,
                effective_plan,
                usage,
                quotas,
                degraded,
            },
        }
    }
}
