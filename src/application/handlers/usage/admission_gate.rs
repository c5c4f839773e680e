//! AdmissionGate - the only path through which a metered action executes.
//!
//! Order of operations for [`AdmissionGate::try_consume`]:
//!
//! 1. Read the subscription and the current period's usage.
//! 2. Evaluate entitlement. The result is advisory: it is a stale read.
//! 3. Run the action (the provider call).
//! 4. On success, increment the ledger before returning. Free-tier users go
//!    through the capped increment, which is the real enforcement boundary.
//!
//! A failed action consumes nothing. A failed increment withholds the
//! action's output.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::entitlement::{evaluate, EntitlementDecision, Quota};
use crate::domain::foundation::UserId;
use crate::domain::subscription::Plan;
use crate::domain::usage::{BillingPeriod, FreeTierLimits, MeteredAction};
use crate::ports::{StoreError, SubscriptionStore};

use super::UsageLedger;

/// Why a metered action was not admitted or not completed.
#[derive(Debug, Error)]
pub enum AdmissionError<E = Infallible> {
    /// Free-tier quota for this period is used up.
    #[error("{action} limit reached: {current_count} of {limit} used this period")]
    LimitReached {
        action: MeteredAction,
        current_count: u32,
        limit: u32,
    },

    /// A store read or the increment failed. Never treated as an allow.
    #[error("usage could not be verified: {0}")]
    StoreUnavailable(StoreError),

    /// The action itself failed; nothing was counted.
    #[error("metered action failed: {0}")]
    Action(E),
}

impl AdmissionError<Infallible> {
    /// Re-types an admission-only error for a call that can also fail in the action.
    pub fn widen<E>(self) -> AdmissionError<E> {
        match self {
            AdmissionError::LimitReached {
                action,
                current_count,
                limit,
            } => AdmissionError::LimitReached {
                action,
                current_count,
                limit,
            },
            AdmissionError::StoreUnavailable(err) => AdmissionError::StoreUnavailable(err),
            AdmissionError::Action(never) => match never {},
        }
    }
}

/// A completed, counted metered action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeOutcome<T> {
    pub output: T,
    /// Effective plan the action was admitted under.
    pub plan: Plan,
    /// Post-increment count for this period.
    pub new_count: u32,
    pub remaining: Quota,
}

pub struct AdmissionGate {
    subscriptions: Arc<dyn SubscriptionStore>,
    ledger: Arc<UsageLedger>,
    limits: FreeTierLimits,
}

impl AdmissionGate {
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

    pub fn limits(&self) -> &FreeTierLimits {
        &self.limits
    }

    /// Decides whether `action` may run for `user_id`, without running or counting it.
    pub async fn admit(
        &self,
        user_id: &UserId,
        action: MeteredAction,
    ) -> Result<EntitlementDecision, AdmissionError> {
        self.admit_in(user_id, action, self.ledger.current_period())
            .await
    }

    async fn admit_in(
        &self,
        user_id: &UserId,
        action: MeteredAction,
        period: BillingPeriod,
    ) -> Result<EntitlementDecision, AdmissionError> {
        let subscription = self
            .subscriptions
            .get_subscription(user_id)
            .await
            .map_err(|e| {
                tracing::warn!(user_id = %user_id, action = %action, error = %e, "subscription read failed; denying");
                AdmissionError::StoreUnavailable(e)
            })?;

        let usage = self.ledger.usage_in(user_id, period).await.map_err(|e| {
            tracing::warn!(user_id = %user_id, action = %action, error = %e, "usage read failed; denying");
            AdmissionError::StoreUnavailable(e)
        })?;

        let decision = evaluate(subscription.as_ref(), &usage, &self.limits, action);

        if !decision.allowed {
            tracing::info!(
                user_id = %user_id,
                action = %action,
                current_count = decision.current_count,
                "metered action denied: limit reached"
            );
            return Err(AdmissionError::LimitReached {
                action,
                current_count: decision.current_count,
                limit: decision.limit.as_option().unwrap_or(decision.current_count),
            });
        }

        Ok(decision)
    }

    /// Admits, runs `perform`, and counts it on success.
    pub async fn try_consume<T, E, F, Fut>(
        &self,
        user_id: &UserId,
        action: MeteredAction,
        perform: F,
    ) -> Result<ConsumeOutcome<T>, AdmissionError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // One period per request, even if the action straddles midnight UTC.
        let period = self.ledger.current_period();
        let decision = self
            .admit_in(user_id, action, period)
            .await
            .map_err(AdmissionError::widen)?;

        let output = match perform().await {
            Ok(output) => output,
            Err(err) => {
                tracing::info!(user_id = %user_id, action = %action, "metered action failed; not counted");
                return Err(AdmissionError::Action(err));
            }
        };

        let store_failed = |e: StoreError| {
            tracing::error!(user_id = %user_id, action = %action, error = %e, "increment failed after action; output withheld");
            AdmissionError::StoreUnavailable(e)
        };

        match decision.limit {
            Quota::Unbounded => {
                let new_count = self
                    .ledger
                    .increment_in(user_id, period, action)
                    .await
                    .map_err(store_failed)?;
                Ok(ConsumeOutcome {
                    output,
                    plan: decision.plan,
                    new_count,
                    remaining: Quota::Unbounded,
                })
            }
            Quota::Limited(limit) => {
                let counted = self
                    .ledger
                    .increment_within_in(user_id, period, action, limit)
                    .await
                    .map_err(store_failed)?;
                match counted {
                    Some(new_count) => Ok(ConsumeOutcome {
                        output,
                        plan: decision.plan,
                        new_count,
                        remaining: Quota::Limited(limit.saturating_sub(new_count)),
                    }),
                    // Bound is exactly `limit`, not `limit + 1`; the provider call is sunk.
                    None => {
                        tracing::info!(
                            user_id = %user_id,
                            action = %action,
                            limit,
                            "lost race at limit; output discarded"
                        );
                        Err(AdmissionError::LimitReached {
                            action,
                            current_count: limit,
                            limit,
                        })
                    }
                }
            }
        }
    }
}
