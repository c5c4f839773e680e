//! Calendar-month billing periods.
//!
//! Quotas reset at 00:00 UTC on the first of each month. Because usage rows
//! are keyed by the period's first day, a new month simply starts reading a
//! key that does not exist yet; no reset job is involved.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BillingPeriod(NaiveDate);

impl BillingPeriod {
    /// The period containing `now` (UTC).
    pub fn containing(now: Timestamp) -> Self {
        Self(now.first_day_of_month())
    }

    /// Period starting on `start`, which is truncated to the first of its month.
    pub fn starting(start: NaiveDate) -> Self {
        Self(start.with_day(1).unwrap_or(start))
    }

    /// First day of the period (inclusive).
    pub fn start(&self) -> NaiveDate {
        self.0
    }

    /// First day of the next period (exclusive end).
    pub fn end(&self) -> NaiveDate {
        self.0.checked_add_months(Months::new(1)).unwrap_or(NaiveDate::MAX)
    }

    pub fn next(&self) -> Self {
        Self(self.end())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start() && date < self.end()
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}
