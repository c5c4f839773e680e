//! Entitlement evaluation.
//!
//! [`evaluate`] is total and side-effect free. It degrades to the free tier
//! whenever the subscription is absent, not pro, not in an entitling status,
//! or structurally malformed; a broken billing path can only ever withhold
//! extra usage, never grant it.

use serde::Serialize;

use crate::domain::subscription::{Plan, SubscriptionRecord, SubscriptionStatus};
use crate::domain::usage::{FreeTierLimits, MeteredAction, UsageRecord};

/// Quota value that is either a concrete count or unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quota {
    Limited(u32),
    Unbounded,
}

impl Quota {
    /// `None` for unbounded; the wire representation uses `null`.
    pub fn as_option(&self) -> Option<u32> {
        match self {
            Quota::Limited(n) => Some(*n),
            Quota::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Quota::Unbounded)
    }
}

impl Serialize for Quota {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_option().serialize(serializer)
    }
}

/// The entitlement tier actually granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveTier {
    ProActive,
    ProTrialing,
    Free,
}

impl EffectiveTier {
    /// Classifies a (possibly absent) subscription record.
    pub fn of(subscription: Option<&SubscriptionRecord>) -> Self {
        match subscription {
            Some(record) if record.grants_pro() => match record.status {
                SubscriptionStatus::Trialing => EffectiveTier::ProTrialing,
                _ => EffectiveTier::ProActive,
            },
            _ => EffectiveTier::Free,
        }
    }

    pub fn plan(&self) -> Plan {
        match self {
            EffectiveTier::ProActive | EffectiveTier::ProTrialing => Plan::Pro,
            EffectiveTier::Free => Plan::Free,
        }
    }
}

/// Outcome of evaluating one metered action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementDecision {
    pub allowed: bool,
    pub plan: Plan,
    pub tier: EffectiveTier,
    pub action: MeteredAction,
    pub current_count: u32,
    pub limit: Quota,
    pub remaining: Quota,
}

/// Decides whether `action` is allowed for this subscription and usage.
pub fn evaluate(
    subscription: Option<&SubscriptionRecord>,
    usage: &UsageRecord,
    limits: &FreeTierLimits,
    action: MeteredAction,
) -> EntitlementDecision {
    let tier = EffectiveTier::of(subscription);
    let current_count = usage.count_for(action);

    let (allowed, limit, remaining) = match tier {
        EffectiveTier::ProActive | EffectiveTier::ProTrialing => {
            (true, Quota::Unbounded, Quota::Unbounded)
        }
        EffectiveTier::Free => {
            let limit = limits.limit_for(action);
            (
                current_count < limit,
                Quota::Limited(limit),
                Quota::Limited(limit.saturating_sub(current_count)),
            )
        }
    };

    EntitlementDecision {
        allowed,
        plan: tier.plan(),
        tier,
        action,
        current_count,
        limit,
        remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::domain::subscription::fixtures::pro_record;
    use crate::domain::subscription::BillingInterval;
    use crate::domain::usage::BillingPeriod;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn usage(ai_chat: u32, photo: u32) -> UsageRecord {
        let period = BillingPeriod::starting(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        UsageRecord::zero(UserId::new("u1").unwrap(), period)
            .with_count(MeteredAction::AiChat, ai_chat)
            .with_count(MeteredAction::PhotoDiagnosis, photo)
    }

    #[test]
    fn new_user_without_subscription_gets_free_quota() {
        let decision = evaluate(
            None,
            &usage(0, 0),
            &FreeTierLimits::default(),
            MeteredAction::AiChat,
        );

        assert!(decision.allowed);
        assert_eq!(decision.plan, Plan::Free);
        assert_eq!(decision.current_count, 0);
        assert_eq!(decision.limit, Quota::Limited(5));
        assert_eq!(decision.remaining, Quota::Limited(5));
    }

    #[test]
    fn free_user_at_limit_is_denied() {
        let decision = evaluate(
            None,
            &usage(5, 0),
            &FreeTierLimits::default(),
            MeteredAction::AiChat,
        );

        assert!(!decision.allowed);
        assert_eq!(decision.current_count, 5);
        assert_eq!(decision.limit, Quota::Limited(5));
        assert_eq!(decision.remaining, Quota::Limited(0));
    }

    #[test]
    fn counts_above_limit_clamp_remaining_to_zero() {
        let decision = evaluate(
            None,
            &usage(0, 9),
            &FreeTierLimits::default(),
            MeteredAction::PhotoDiagnosis,
        );
        assert_eq!(decision.remaining, Quota::Limited(0));
    }

    #[test]
    fn actions_use_their_own_counters() {
        let decision = evaluate(
            None,
            &usage(5, 1),
            &FreeTierLimits::default(),
            MeteredAction::PhotoDiagnosis,
        );
        assert!(decision.allowed);
        assert_eq!(decision.remaining, Quota::Limited(2));
    }

    #[test]
    fn past_due_pro_is_treated_as_free() {
        let record = pro_record("u1", SubscriptionStatus::PastDue);
        let decision = evaluate(
            Some(&record),
            &usage(5, 0),
            &FreeTierLimits::default(),
            MeteredAction::AiChat,
        );

        assert!(!decision.allowed);
        assert_eq!(decision.plan, Plan::Free);
        assert_eq!(decision.tier, EffectiveTier::Free);
    }

    #[test]
    fn trialing_pro_is_unbounded() {
        let record = pro_record("u1", SubscriptionStatus::Trialing);
        let decision = evaluate(
            Some(&record),
            &usage(500, 0),
            &FreeTierLimits::default(),
            MeteredAction::AiChat,
        );

        assert!(decision.allowed);
        assert_eq!(decision.tier, EffectiveTier::ProTrialing);
        assert_eq!(decision.remaining, Quota::Unbounded);
    }

    #[test]
    fn zero_limit_denies_every_free_request() {
        let decision = evaluate(
            None,
            &usage(0, 0),
            &FreeTierLimits::new(0, 0),
            MeteredAction::AiChat,
        );
        assert!(!decision.allowed);
    }

    #[test]
    fn quota_serializes_unbounded_as_null() {
        assert_eq!(serde_json::to_string(&Quota::Unbounded).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Quota::Limited(3)).unwrap(), "3");
    }

    fn arb_status() -> impl Strategy<Value = SubscriptionStatus> {
        prop_oneof![
            Just(SubscriptionStatus::Active),
            Just(SubscriptionStatus::Trialing),
            Just(SubscriptionStatus::PastDue),
            Just(SubscriptionStatus::Canceled),
        ]
    }

    fn arb_action() -> impl Strategy<Value = MeteredAction> {
        prop_oneof![Just(MeteredAction::AiChat), Just(MeteredAction::PhotoDiagnosis)]
    }

    /// Records that break at least one structural invariant, or are not pro.
    fn arb_non_entitling_record() -> impl Strategy<Value = SubscriptionRecord> {
        (arb_status(), 0u8..5).prop_map(|(status, defect)| {
            let mut record = pro_record("u1", status);
            match defect {
                0 => record.billing_interval = None,
                1 => {
                    record.plan = Plan::Free;
                    record.billing_interval = None;
                }
                2 => record.plan = Plan::Free,
                3 => {
                    record.trial_end = match status {
                        SubscriptionStatus::Trialing => None,
                        _ => record.current_period_end,
                    }
                }
                _ => {
                    record.status = SubscriptionStatus::PastDue;
                    record.trial_end = None;
                }
            }
            record
        })
    }

    proptest! {
        #[test]
        fn malformed_or_absent_records_never_yield_pro(
            record in proptest::option::of(arb_non_entitling_record()),
            ai_chat in 0u32..100,
            photo in 0u32..100,
            action in arb_action(),
        ) {
            let decision = evaluate(
                record.as_ref(),
                &usage(ai_chat, photo),
                &FreeTierLimits::default(),
                action,
            );
            prop_assert_eq!(decision.plan, Plan::Free);
            prop_assert!(!decision.limit.is_unbounded());
        }

        #[test]
        fn active_pro_is_unbounded_regardless_of_count(
            count in any::<u32>(),
            interval in prop_oneof![Just(BillingInterval::Month), Just(BillingInterval::Year)],
            action in arb_action(),
        ) {
            let mut record = pro_record("u1", SubscriptionStatus::Active);
            record.billing_interval = Some(interval);
            let decision = evaluate(
                Some(&record),
                &usage(count, count),
                &FreeTierLimits::default(),
                action,
            );
            prop_assert!(decision.allowed);
            prop_assert_eq!(decision.remaining, Quota::Unbounded);
        }

        #[test]
        fn free_remaining_is_limit_minus_count_floored(
            count in 0u32..50,
            limit in 0u32..50,
        ) {
            let decision = evaluate(
                None,
                &usage(count, 0),
                &FreeTierLimits::new(limit, 3),
                MeteredAction::AiChat,
            );
            prop_assert_eq!(decision.allowed, count < limit);
            prop_assert_eq!(decision.remaining, Quota::Limited(limit.saturating_sub(count)));
        }
    }
}
