//! Per-user subscription lifecycle.
//!
//! The lifecycle is derived from the stored record: no record, or a record on
//! the free plan, is the `Free` state. Every other state mirrors the stored
//! status of a pro record.
//!
//! ```text
//!   free ──► trialing ──► active ◄──► past_due
//!               │            │           │
//!               └────────► canceled ◄────┘
//!                            │
//!                            └──► trialing (re-subscribe)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

use super::{Plan, SubscriptionRecord, SubscriptionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Free,
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl LifecycleState {
    /// Lifecycle state of a user given their (possibly absent) record.
    pub fn of(record: Option<&SubscriptionRecord>) -> Self {
        match record {
            None => LifecycleState::Free,
            Some(r) if r.plan == Plan::Free => LifecycleState::Free,
            Some(r) => Self::from_status(r.status),
        }
    }

    /// Lifecycle state a pro record with `status` sits in.
    pub fn from_status(status: SubscriptionStatus) -> Self {
        match status {
            SubscriptionStatus::Trialing => LifecycleState::Trialing,
            SubscriptionStatus::Active => LifecycleState::Active,
            SubscriptionStatus::PastDue => LifecycleState::PastDue,
            SubscriptionStatus::Canceled => LifecycleState::Canceled,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Free => "free",
            LifecycleState::Trialing => "trialing",
            LifecycleState::Active => "active",
            LifecycleState::PastDue => "past_due",
            LifecycleState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

impl StateMachine for LifecycleState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use LifecycleState::*;
        matches!(
            (self, target),
            // Upgrade initiated
            (Free, Trialing)
            // From TRIALING
                | (Trialing, Active)
                | (Trialing, Canceled)
            // From ACTIVE
                | (Active, PastDue)
                | (Active, Canceled)
            // From PAST_DUE
                | (PastDue, Active)
                | (PastDue, Canceled)
            // Re-subscribe
                | (Canceled, Trialing)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use LifecycleState::*;
        match self {
            Free => vec![Trialing],
            Trialing => vec![Active, Canceled],
            Active => vec![PastDue, Canceled],
            PastDue => vec![Active, Canceled],
            Canceled => vec![Trialing],
        }
    }
}
