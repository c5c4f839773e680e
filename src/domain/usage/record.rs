//! Per-user, per-period usage counters.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserId;

use super::{BillingPeriod, MeteredAction};

/// One row of the usage table. Absence of a row means zero usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: UserId,
    pub period_start: NaiveDate,
    pub ai_chat_count: u32,
    pub photo_diagnosis_count: u32,
}

impl UsageRecord {
    /// The implicit record for a user with no activity in `period`.
    pub fn zero(user_id: UserId, period: BillingPeriod) -> Self {
        Self {
            user_id,
            period_start: period.start(),
            ai_chat_count: 0,
            photo_diagnosis_count: 0,
        }
    }

    pub fn count_for(&self, action: MeteredAction) -> u32 {
        match action {
            MeteredAction::AiChat => self.ai_chat_count,
            MeteredAction::PhotoDiagnosis => self.photo_diagnosis_count,
        }
    }

    /// Sets one counter. Used by store adapters when materializing rows.
    pub fn with_count(mut self, action: MeteredAction, count: u32) -> Self {
        match action {
            MeteredAction::AiChat => self.ai_chat_count = count,
            MeteredAction::PhotoDiagnosis => self.photo_diagnosis_count = count,
        }
        self
    }

    pub fn period(&self) -> BillingPeriod {
        BillingPeriod::starting(self.period_start)
    }
}
