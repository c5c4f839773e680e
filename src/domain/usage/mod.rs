//! Usage domain: metered actions, periods, counters and free-tier quotas.

mod action;
mod limits;
mod period;
mod record;

pub use action::MeteredAction;
pub use limits::FreeTierLimits;
pub use period::BillingPeriod;
pub use record::UsageRecord;
