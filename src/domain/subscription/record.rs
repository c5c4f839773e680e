//! The per-user subscription record.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId, ValidationError};

use super::{BillingInterval, Plan, SubscriptionStatus};

/// Opaque references into the billing provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRefs {
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

impl BillingRefs {
    /// Keeps each reference from `self`, falling back to `existing`.
    pub fn or(self, existing: &BillingRefs) -> BillingRefs {
        BillingRefs {
            customer_id: self.customer_id.or_else(|| existing.customer_id.clone()),
            subscription_id: self
                .subscription_id
                .or_else(|| existing.subscription_id.clone()),
        }
    }
}

/// One row of the `subscriptions` table.
///
/// A user with no record is on the free plan. Records are only written by the
/// plan transition handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub user_id: UserId,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    /// Present iff `plan` is pro.
    pub billing_interval: Option<BillingInterval>,
    /// End of the current paid or trial period.
    pub current_period_end: Option<Timestamp>,
    /// Present iff `status` is trialing.
    pub trial_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub billing_refs: BillingRefs,
    /// Bookkeeping only. Excluded from idempotency comparisons.
    pub updated_at: Timestamp,
}

impl SubscriptionRecord {
    /// Checks the record's structural invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.plan, self.billing_interval) {
            (Plan::Pro, None) => {
                return Err(ValidationError::empty_field("billing_interval"));
            }
            (Plan::Free, Some(_)) => {
                return Err(ValidationError::invalid_format(
                    "billing_interval",
                    "must be absent on the free plan",
                ));
            }
            _ => {}
        }

        match (self.status, self.trial_end) {
            (SubscriptionStatus::Trialing, None) => {
                Err(ValidationError::empty_field("trial_end"))
            }
            (status, Some(_)) if status != SubscriptionStatus::Trialing => {
                Err(ValidationError::invalid_format(
                    "trial_end",
                    format!("must be absent when status is {}", status),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Returns true if this record grants pro entitlements.
    ///
    /// Requires a well-formed record with plan pro and an entitling status.
    /// Anything else is served as free.
    pub fn grants_pro(&self) -> bool {
        self.plan == Plan::Pro && self.status.grants_entitlement() && self.validate().is_ok()
    }

    /// Field-wise equality ignoring `updated_at`.
    pub fn same_state_as(&self, other: &SubscriptionRecord) -> bool {
        self.user_id == other.user_id
            && self.plan == other.plan
            && self.status == other.status
            && self.billing_interval == other.billing_interval
            && self.current_period_end == other.current_period_end
            && self.trial_end == other.trial_end
            && self.cancel_at_period_end == other.cancel_at_period_end
            && self.billing_refs == other.billing_refs
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn well_formed_pro_record_validates() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Trialing,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
        ] {
            assert!(pro_record("u1", status).validate().is_ok(), "{:?}", status);
        }
    }

    #[test]
    fn pro_without_interval_is_malformed() {
        let mut record = pro_record("u1", SubscriptionStatus::Active);
        record.billing_interval = None;
        assert!(record.validate().is_err());
        assert!(!record.grants_pro());
    }

    #[test]
    fn free_with_interval_is_malformed() {
        let mut record = pro_record("u1", SubscriptionStatus::Active);
        record.plan = Plan::Free;
        assert!(record.validate().is_err());
    }

    #[test]
    fn trial_end_must_match_trialing_status() {
        let mut trialing = pro_record("u1", SubscriptionStatus::Trialing);
        trialing.trial_end = None;
        assert!(trialing.validate().is_err());

        let mut active = pro_record("u1", SubscriptionStatus::Active);
        active.trial_end = Some(ts("2025-06-08T00:00:00Z"));
        assert!(active.validate().is_err());
    }

    #[test]
    fn past_due_pro_does_not_grant_pro() {
        assert!(!pro_record("u1", SubscriptionStatus::PastDue).grants_pro());
        assert!(!pro_record("u1", SubscriptionStatus::Canceled).grants_pro());
        assert!(pro_record("u1", SubscriptionStatus::Trialing).grants_pro());
    }

    #[test]
    fn same_state_ignores_updated_at() {
        let a = pro_record("u1", SubscriptionStatus::Active);
        let mut b = a.clone();
        b.updated_at = b.updated_at.plus_secs(60);
        assert!(a.same_state_as(&b));

        b.cancel_at_period_end = true;
        assert!(!a.same_state_as(&b));
    }

    #[test]
    fn billing_refs_or_prefers_new_values() {
        let existing = BillingRefs {
            customer_id: Some("cus_old".to_string()),
            subscription_id: Some("sub_old".to_string()),
        };
        let merged = BillingRefs {
            customer_id: Some("cus_new".to_string()),
            subscription_id: None,
        }
        .or(&existing);

        assert_eq!(merged.customer_id.as_deref(), Some("cus_new"));
        assert_eq!(merged.subscription_id.as_deref(), Some("sub_old"));
    }
}
