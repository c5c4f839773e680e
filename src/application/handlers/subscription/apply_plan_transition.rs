//! ApplyPlanTransitionHandler - command handler for subscription changes.
//!
//! Reads the current record, computes the next one purely, and writes only
//! when something changed. Redelivered billing events therefore cost one
//! read and no write.

use std::sync::Arc;

use crate::domain::foundation::{AuthenticatedUser, UserId};
use crate::domain::subscription::{
    compute_transition, PlanTransition, SubscriptionError, TransitionOutcome,
};
use crate::ports::{Clock, SubscriptionStore};

/// Who is asking for the transition.
#[derive(Debug, Clone)]
pub enum TransitionActor {
    /// Verified billing webhook or another trusted internal caller.
    System,
    /// An authenticated API caller.
    User(AuthenticatedUser),
}

#[derive(Debug, Clone)]
pub struct ApplyPlanTransitionCommand {
    pub user_id: UserId,
    pub transition: PlanTransition,
    pub actor: TransitionActor,
}

pub struct ApplyPlanTransitionHandler {
    store: Arc<dyn SubscriptionStore>,
    clock: Arc<dyn Clock>,
}

impl ApplyPlanTransitionHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn handle(
        &self,
        cmd: ApplyPlanTransitionCommand,
    ) -> Result<TransitionOutcome, SubscriptionError> {
        authorize(&cmd)?;

        let existing = self.store.get_subscription(&cmd.user_id).await?;
        let outcome = compute_transition(
            &cmd.user_id,
            existing.as_ref(),
            &cmd.transition,
            self.clock.now(),
        )
        .map_err(|e| {
            tracing::info!(user_id = %cmd.user_id, kind = cmd.transition.kind(), error = %e, "transition rejected");
            e
        })?;

        match &outcome {
            TransitionOutcome::Changed(record) => {
                self.store.upsert_subscription(record).await?;
                tracing::info!(
                    user_id = %cmd.user_id,
                    kind = cmd.transition.kind(),
                    plan = %record.plan,
                    status = %record.status,
                    "subscription changed"
                );
            }
            TransitionOutcome::Unchanged(_) => {
                tracing::debug!(user_id = %cmd.user_id, kind = cmd.transition.kind(), "transition already applied");
            }
        }

        Ok(outcome)
    }
}

fn authorize(cmd: &ApplyPlanTransitionCommand) -> Result<(), SubscriptionError> {
    let caller = match &cmd.actor {
        TransitionActor::System => return Ok(()),
        TransitionActor::User(caller) => caller,
    };

    match &cmd.transition {
        PlanTransition::AdminOverride { .. } if caller.is_admin() => Ok(()),
        PlanTransition::AdminOverride { .. } => {
            tracing::warn!(caller = %caller.id, target = %cmd.user_id, "non-admin attempted plan override");
            Err(SubscriptionError::forbidden("plan overrides require the admin role"))
        }
        PlanTransition::Billing(_) if caller.id == cmd.user_id || caller.is_admin() => Ok(()),
        PlanTransition::Billing(_) => Err(SubscriptionError::forbidden(
            "cannot change another user's subscription",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::adapters::FixedClock;
    use crate::domain::foundation::Role;
    use crate::domain::subscription::fixtures::ts;
    use crate::domain::subscription::{
        BillingInterval, Plan, SubscriptionStatus, TargetState,
    };

    fn user_id() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn caller(id: &str, role: Role) -> TransitionActor {
        TransitionActor::User(
            AuthenticatedUser::new(UserId::new(id).unwrap(), None).with_role(role),
        )
    }

    fn setup() -> (ApplyPlanTransitionHandler, InMemorySubscriptionStore, FixedClock) {
        let store = InMemorySubscriptionStore::new();
        let clock = FixedClock::new(ts("2025-03-10T08:00:00Z"));
        let handler =
            ApplyPlanTransitionHandler::new(Arc::new(store.clone()), Arc::new(clock.clone()));
        (handler, store, clock)
    }

    fn upgrade(interval: BillingInterval) -> ApplyPlanTransitionCommand {
        ApplyPlanTransitionCommand {
            user_id: user_id(),
            transition: PlanTransition::Billing(TargetState::start_trial(interval)),
            actor: caller("user-1", Role::User),
        }
    }

    #[tokio::test]
    async fn monthly_upgrade_starts_seven_day_trial() {
        let (handler, store, _) = setup();

        let record = handler
            .handle(upgrade(BillingInterval::Month))
            .await
            .unwrap()
            .into_record();

        assert_eq!(record.plan, Plan::Pro);
        assert_eq!(record.status, SubscriptionStatus::Trialing);
        assert_eq!(record.trial_end, Some(ts("2025-03-17T08:00:00Z")));
        assert_eq!(record.current_period_end, Some(ts("2025-04-09T08:00:00Z")));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn repeated_upgrade_is_a_no_op_even_later() {
        let (handler, store, clock) = setup();
        let first = handler
            .handle(upgrade(BillingInterval::Year))
            .await
            .unwrap()
            .into_record();

        clock.advance_days(2);
        let second = handler.handle(upgrade(BillingInterval::Year)).await.unwrap();

        assert!(!second.is_changed());
        assert_eq!(second.record(), &first);
        assert_eq!(
            store.get_subscription(&user_id()).await.unwrap().unwrap().updated_at,
            first.updated_at
        );
    }

    #[tokio::test]
    async fn override_requires_admin() {
        let (handler, store, _) = setup();
        let cmd = ApplyPlanTransitionCommand {
            user_id: user_id(),
            transition: PlanTransition::AdminOverride { plan: Plan::Pro },
            actor: caller("user-1", Role::User),
        };

        let err = handler.handle(cmd).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Forbidden(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn admin_override_grants_active_pro_without_trial() {
        let (handler, _, _) = setup();
        let cmd = ApplyPlanTransitionCommand {
            user_id: user_id(),
            transition: PlanTransition::AdminOverride { plan: Plan::Pro },
            actor: caller("ops-1", Role::Admin),
        };

        let record = handler.handle(cmd).await.unwrap().into_record();
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(record.trial_end, None);
    }

    #[tokio::test]
    async fn users_cannot_upgrade_someone_else() {
        let (handler, _, _) = setup();
        let mut cmd = upgrade(BillingInterval::Month);
        cmd.actor = caller("user-2", Role::User);

        assert!(matches!(
            handler.handle(cmd).await.unwrap_err(),
            SubscriptionError::Forbidden(_)
        ));
    }

    #[tokio::test]
    async fn unreachable_state_is_rejected_before_write() {
        let (handler, store, _) = setup();
        let cmd = ApplyPlanTransitionCommand {
            user_id: user_id(),
            transition: PlanTransition::Billing(TargetState::mark_past_due()),
            actor: TransitionActor::System,
        };

        let err = handler.handle(cmd).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidTransition { .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn store_outage_is_reported() {
        let (handler, store, _) = setup();
        store.set_unavailable(true);

        let err = handler.handle(upgrade(BillingInterval::Month)).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::StoreUnavailable(_)));
    }
}
