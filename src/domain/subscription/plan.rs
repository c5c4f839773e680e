//! Plan and billing interval enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Stored subscription plan.
///
/// The stored plan is not the same as the granted tier: a `pro` record whose
/// status is `past_due` or `canceled` is served free-tier limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            other => Err(ValidationError::invalid_format(
                "plan",
                format!("expected 'free' or 'pro', got '{}'", other),
            )),
        }
    }
}

/// Billing cadence of a pro subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Month,
    Year,
}

impl BillingInterval {
    /// Length of one paid period in days.
    ///
    /// | Interval | Days |
    /// |----------|------|
    /// | month    | 30   |
    /// | year     | 365  |
    ///
    /// These are fixed approximations. They are not calendar-accurate and do
    /// not model proration; the billing provider's own period end wins
    /// whenever it is supplied.
    pub fn period_days(&self) -> i64 {
        match self {
            BillingInterval::Month => 30,
            BillingInterval::Year => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingInterval {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "month" => Ok(BillingInterval::Month),
            "year" => Ok(BillingInterval::Year),
            other => Err(ValidationError::invalid_format(
                "interval",
                format!("expected 'month' or 'year', got '{}'", other),
            )),
        }
    }
}
