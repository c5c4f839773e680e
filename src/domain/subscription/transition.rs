//! Pure computation of subscription transitions.
//!
//! `compute_transition` takes the current record (if any), the requested
//! transition and "now", and returns the record to upsert. It performs no I/O;
//! the application handler reads and writes the store around it.
//!
//! Derived dates are simplifications, not billing-accurate proration:
//!
//! | Quantity           | Value                                   |
//! |--------------------|-----------------------------------------|
//! | trial window       | now + 7 days                            |
//! | monthly period end | now + 30 days                           |
//! | yearly period end  | now + 365 days                          |
//!
//! When the billing provider supplies its own period end the transition
//! carries it as [`PeriodEndPolicy::Fixed`] and it is stored verbatim.

use crate::domain::foundation::{StateMachine, Timestamp, UserId};

use super::{
    BillingInterval, BillingRefs, LifecycleState, Plan, SubscriptionError, SubscriptionRecord,
    SubscriptionStatus,
};

/// Length of the trial window granted on upgrade.
pub const TRIAL_DAYS: i64 = 7;

/// How `current_period_end` is derived for the new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodEndPolicy {
    /// now + the interval's period length.
    FromInterval,
    /// Keep the existing period end; compute from the interval if there is none.
    Preserve,
    /// Use the provider-supplied period end.
    Fixed(Timestamp),
}

/// Desired state for a billing-driven transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetState {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    /// `None` keeps the existing interval.
    pub billing_interval: Option<BillingInterval>,
    pub period_end_policy: PeriodEndPolicy,
    /// `None` keeps the scheduled-cancellation flag of an existing pro record.
    pub cancel_at_period_end: Option<bool>,
    /// New provider references; absent values keep the existing ones.
    pub billing_refs: BillingRefs,
}

impl TargetState {
    fn pro(
        status: SubscriptionStatus,
        interval: Option<BillingInterval>,
        policy: PeriodEndPolicy,
    ) -> Self {
        Self {
            plan: Plan::Pro,
            status,
            billing_interval: interval,
            period_end_policy: policy,
            cancel_at_period_end: None,
            billing_refs: BillingRefs::default(),
        }
    }

    /// Upgrade, checkout completion or re-subscribe: starts a trial.
    pub fn start_trial(interval: BillingInterval) -> Self {
        Self::pro(
            SubscriptionStatus::Trialing,
            Some(interval),
            PeriodEndPolicy::FromInterval,
        )
        .with_cancel_at_period_end(false)
    }

    /// Trial conversion or payment recovery.
    pub fn activate(interval: Option<BillingInterval>) -> Self {
        Self::pro(SubscriptionStatus::Active, interval, PeriodEndPolicy::FromInterval)
    }

    pub fn mark_past_due() -> Self {
        Self::pro(SubscriptionStatus::PastDue, None, PeriodEndPolicy::Preserve)
    }

    pub fn cancel_immediately() -> Self {
        Self::pro(SubscriptionStatus::Canceled, None, PeriodEndPolicy::Preserve)
            .with_cancel_at_period_end(false)
    }

    /// Keeps the current status and flags the subscription to end with its period.
    pub fn schedule_cancellation(current: &SubscriptionRecord) -> Self {
        Self::pro(current.status, None, PeriodEndPolicy::Preserve).with_cancel_at_period_end(true)
    }

    /// Arbitrary provider-reported status (subscription sync events).
    pub fn synced(status: SubscriptionStatus, interval: Option<BillingInterval>) -> Self {
        Self::pro(status, interval, PeriodEndPolicy::Preserve)
    }

    pub fn with_period_end(mut self, period_end: Timestamp) -> Self {
        self.period_end_policy = PeriodEndPolicy::Fixed(period_end);
        self
    }

    pub fn with_cancel_at_period_end(mut self, cancel: bool) -> Self {
        self.cancel_at_period_end = Some(cancel);
        self
    }

    pub fn with_billing_refs(mut self, refs: BillingRefs) -> Self {
        self.billing_refs = refs;
        self
    }
}

/// A requested change to a user's subscription.
///
/// The two kinds are kept apart so that an administrative override can never
/// grant trial semantics, and a billing event can never bypass the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanTransition {
    /// Driven by checkout, the billing provider or a self-service action.
    /// Validated against the lifecycle state machine.
    Billing(TargetState),

    /// Role-gated direct plan assignment. No trial, no lifecycle check.
    AdminOverride { plan: Plan },
}

impl PlanTransition {
    pub fn kind(&self) -> &'static str {
        match self {
            PlanTransition::Billing(_) => "billing",
            PlanTransition::AdminOverride { .. } => "admin_override",
        }
    }
}

/// Result of computing a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The existing record already reflects the request.
    Unchanged(SubscriptionRecord),
    /// A new record that must be upserted.
    Changed(SubscriptionRecord),
}

impl TransitionOutcome {
    pub fn record(&self) -> &SubscriptionRecord {
        match self {
            TransitionOutcome::Unchanged(r) | TransitionOutcome::Changed(r) => r,
        }
    }

    pub fn into_record(self) -> SubscriptionRecord {
        match self {
            TransitionOutcome::Unchanged(r) | TransitionOutcome::Changed(r) => r,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, TransitionOutcome::Changed(_))
    }
}

/// Computes the record that results from applying `transition` at `now`.
pub fn compute_transition(
    user_id: &UserId,
    existing: Option<&SubscriptionRecord>,
    transition: &PlanTransition,
    now: Timestamp,
) -> Result<TransitionOutcome, SubscriptionError> {
    let outcome = match transition {
        PlanTransition::Billing(target) => apply_billing(user_id, existing, target, now)?,
        PlanTransition::AdminOverride { plan } => apply_override(user_id, existing, *plan, now),
    };

    outcome.record().validate()?;
    Ok(outcome)
}

fn apply_billing(
    user_id: &UserId,
    existing: Option<&SubscriptionRecord>,
    target: &TargetState,
    now: Timestamp,
) -> Result<TransitionOutcome, SubscriptionError> {
    if target.plan != Plan::Pro {
        return Err(SubscriptionError::invalid_transition(
            "billing events cannot assign the free plan",
        ));
    }

    // Only a pro record contributes an interval; a free record never has one.
    let interval = target
        .billing_interval
        .or_else(|| existing.and_then(|r| r.billing_interval))
        .ok_or_else(|| SubscriptionError::invalid_transition("billing interval is required"))?;

    let from = LifecycleState::of(existing);
    let to = LifecycleState::from_status(target.status);
    if from != to && !from.can_transition_to(&to) {
        return Err(SubscriptionError::unreachable_state(from, to));
    }

    if let Some(current) = existing {
        if reflects(current, target, interval) {
            return Ok(TransitionOutcome::Unchanged(current.clone()));
        }
    }

    let existing_pro = existing.filter(|r| r.plan == Plan::Pro);

    let current_period_end = match target.period_end_policy {
        PeriodEndPolicy::FromInterval => now.add_days(interval.period_days()),
        PeriodEndPolicy::Preserve => existing_pro
            .and_then(|r| r.current_period_end)
            .unwrap_or_else(|| now.add_days(interval.period_days())),
        PeriodEndPolicy::Fixed(end) => end,
    };

    // Switching interval mid-trial keeps the original trial window.
    let trial_end = if target.status == SubscriptionStatus::Trialing {
        existing_pro
            .filter(|r| r.status == SubscriptionStatus::Trialing)
            .and_then(|r| r.trial_end)
            .or_else(|| Some(now.add_days(TRIAL_DAYS)))
    } else {
        None
    };

    let cancel_at_period_end = target
        .cancel_at_period_end
        .or_else(|| existing_pro.map(|r| r.cancel_at_period_end))
        .unwrap_or(false);

    let existing_refs = existing.map(|r| r.billing_refs.clone()).unwrap_or_default();

    Ok(TransitionOutcome::Changed(SubscriptionRecord {
        user_id: user_id.clone(),
        plan: Plan::Pro,
        status: target.status,
        billing_interval: Some(interval),
        current_period_end: Some(current_period_end),
        trial_end,
        cancel_at_period_end,
        billing_refs: target.billing_refs.clone().or(&existing_refs),
        updated_at: now,
    }))
}

/// True when applying `target` to `current` would change nothing but `updated_at`.
fn reflects(current: &SubscriptionRecord, target: &TargetState, interval: BillingInterval) -> bool {
    let period_end_matches = match target.period_end_policy {
        PeriodEndPolicy::Fixed(end) => current.current_period_end == Some(end),
        PeriodEndPolicy::FromInterval | PeriodEndPolicy::Preserve => true,
    };
    let refs_match = target
        .billing_refs
        .customer_id
        .as_ref()
        .map_or(true, |id| current.billing_refs.customer_id.as_ref() == Some(id))
        && target
            .billing_refs
            .subscription_id
            .as_ref()
            .map_or(true, |id| current.billing_refs.subscription_id.as_ref() == Some(id));

    current.plan == target.plan
        && current.status == target.status
        && current.billing_interval == Some(interval)
        && target
            .cancel_at_period_end
            .map_or(true, |cancel| current.cancel_at_period_end == cancel)
        && period_end_matches
        && refs_match
        && current.validate().is_ok()
}

fn apply_override(
    user_id: &UserId,
    existing: Option<&SubscriptionRecord>,
    plan: Plan,
    now: Timestamp,
) -> TransitionOutcome {
    let refs = existing.map(|r| r.billing_refs.clone()).unwrap_or_default();

    match plan {
        Plan::Pro => {
            if let Some(current) = existing {
                if current.plan == Plan::Pro
                    && current.status == SubscriptionStatus::Active
                    && !current.cancel_at_period_end
                    && current.validate().is_ok()
                {
                    return TransitionOutcome::Unchanged(current.clone());
                }
            }

            let existing_pro = existing.filter(|r| r.plan == Plan::Pro);
            let interval = existing_pro
                .and_then(|r| r.billing_interval)
                .unwrap_or(BillingInterval::Month);
            let period_end = existing_pro
                .and_then(|r| r.current_period_end)
                .filter(|end| end.is_after(&now))
                .unwrap_or_else(|| now.add_days(interval.period_days()));

            TransitionOutcome::Changed(SubscriptionRecord {
                user_id: user_id.clone(),
                plan: Plan::Pro,
                status: SubscriptionStatus::Active,
                billing_interval: Some(interval),
                current_period_end: Some(period_end),
                trial_end: None,
                cancel_at_period_end: false,
                billing_refs: refs,
                updated_at: now,
            })
        }
        Plan::Free => {
            let downgraded = SubscriptionRecord {
                user_id: user_id.clone(),
                plan: Plan::Free,
                status: SubscriptionStatus::Active,
                billing_interval: None,
                current_period_end: None,
                trial_end: None,
                cancel_at_period_end: false,
                billing_refs: refs,
                updated_at: now,
            };
            match existing {
                Some(current) if current.same_state_as(&downgraded) => {
                    TransitionOutcome::Unchanged(current.clone())
                }
                _ => TransitionOutcome::Changed(downgraded),
            }
        }
    }
}
