//! UsageLedger - per-user, per-period counters for metered actions.
//!
//! The period always comes from the injected clock, so counters roll over
//! at the start of each UTC calendar month without a reset job. Reads never
//! create rows; increments go through the store's atomic primitive.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::usage::{BillingPeriod, MeteredAction, UsageRecord};
use crate::ports::{Clock, StoreError, UsageStore};

pub struct UsageLedger {
    store: Arc<dyn UsageStore>,
    clock: Arc<dyn Clock>,
}

impl UsageLedger {
    pub fn new(store: Arc<dyn UsageStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The period containing the clock's current time.
    pub fn current_period(&self) -> BillingPeriod {
        BillingPeriod::containing(self.clock.now())
    }

    /// Usage for the current period, or a zero record if there is none.
    ///
    /// Store failures propagate; degrading to zero is the caller's call.
    pub async fn get_current_usage(&self, user_id: &UserId) -> Result<UsageRecord, StoreError> {
        self.usage_in(user_id, self.current_period()).await
    }

    pub async fn increment_ai_chat(&self, user_id: &UserId) -> Result<u32, StoreError> {
        self.increment(user_id, MeteredAction::AiChat).await
    }

    pub async fn increment_photo_diagnosis(&self, user_id: &UserId) -> Result<u32, StoreError> {
        self.increment(user_id, MeteredAction::PhotoDiagnosis).await
    }

    /// Atomically adds one to `action`'s counter for the current period.
    pub async fn increment(
        &self,
        user_id: &UserId,
        action: MeteredAction,
    ) -> Result<u32, StoreError> {
        self.increment_in(user_id, self.current_period(), action)
            .await
    }

    /// Like [`increment`](Self::increment), but only while the count is below `cap`.
    pub async fn increment_within(
        &self,
        user_id: &UserId,
        action: MeteredAction,
        cap: u32,
    ) -> Result<Option<u32>, StoreError> {
        self.increment_within_in(user_id, self.current_period(), action, cap)
            .await
    }

    pub(crate) async fn usage_in(
        &self,
        user_id: &UserId,
        period: BillingPeriod,
    ) -> Result<UsageRecord, StoreError> {
        let record = self.store.get_usage(user_id, period.start()).await?;
        Ok(record.unwrap_or_else(|| UsageRecord::zero(user_id.clone(), period)))
    }

    pub(crate) async fn increment_in(
        &self,
        user_id: &UserId,
        period: BillingPeriod,
        action: MeteredAction,
    ) -> Result<u32, StoreError> {
        let count = self
            .store
            .atomic_increment(user_id, period.start(), action)
            .await?;
        tracing::debug!(user_id = %user_id, action = %action, period = %period, count, "usage incremented");
        Ok(count)
    }

    pub(crate) async fn increment_within_in(
        &self,
        user_id: &UserId,
        period: BillingPeriod,
        action: MeteredAction,
        cap: u32,
    ) -> Result<Option<u32>, StoreError> {
        let count = self
            .store
            .atomic_increment_capped(user_id, period.start(), action, cap)
            .await?;
        match count {
            Some(count) => {
                tracing::debug!(user_id = %user_id, action = %action, period = %period, count, cap, "usage incremented")
            }
            None => {
                tracing::debug!(user_id = %user_id, action = %action, period = %period, cap, "usage cap reached")
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryUsageStore;
    use crate::adapters::FixedClock;
    use crate::domain::subscription::fixtures::ts;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn ledger_at(now: &str) -> (UsageLedger, InMemoryUsageStore, FixedClock) {
        let store = InMemoryUsageStore::new();
        let clock = FixedClock::new(ts(now));
        let ledger = UsageLedger::new(Arc::new(store.clone()), Arc::new(clock.clone()));
        (ledger, store, clock)
    }

    #[tokio::test]
    async fn read_without_row_is_zero_and_writes_nothing() {
        let (ledger, store, _) = ledger_at("2025-06-14T09:00:00Z");

        let usage = ledger.get_current_usage(&user()).await.unwrap();

        assert_eq!(usage.ai_chat_count, 0);
        assert_eq!(usage.photo_diagnosis_count, 0);
        assert_eq!(usage.period_start.to_string(), "2025-06-01");
        assert_eq!(store.row_count().await, 0);
    }

    #[tokio::test]
    async fn increments_are_sequential_per_action() {
        let (ledger, _, _) = ledger_at("2025-06-14T09:00:00Z");

        assert_eq!(ledger.increment_ai_chat(&user()).await.unwrap(), 1);
        assert_eq!(ledger.increment_ai_chat(&user()).await.unwrap(), 2);
        assert_eq!(ledger.increment_photo_diagnosis(&user()).await.unwrap(), 1);

        let usage = ledger.get_current_usage(&user()).await.unwrap();
        assert_eq!(usage.ai_chat_count, 2);
        assert_eq!(usage.photo_diagnosis_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_increments_hand_out_every_count_once() {
        const N: u32 = 64;
        let (ledger, _, _) = ledger_at("2025-06-14T09:00:00Z");
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..N)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.increment_ai_chat(&user()).await })
            })
            .collect();

        let mut counts = Vec::with_capacity(N as usize);
        for handle in handles {
            counts.push(handle.await.unwrap().unwrap());
        }
        counts.sort_unstable();

        assert_eq!(counts, (1..=N).collect::<Vec<_>>());
        let usage = ledger.get_current_usage(&user()).await.unwrap();
        assert_eq!(usage.ai_chat_count, N);
    }

    #[tokio::test]
    async fn new_month_starts_from_zero() {
        let (ledger, _, clock) = ledger_at("2025-06-30T23:59:00Z");
        ledger.increment_ai_chat(&user()).await.unwrap();
        ledger.increment_ai_chat(&user()).await.unwrap();

        clock.set(ts("2025-07-01T00:00:30Z"));

        assert_eq!(ledger.get_current_usage(&user()).await.unwrap().ai_chat_count, 0);
        assert_eq!(ledger.increment_ai_chat(&user()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn capped_increment_stops_at_cap() {
        let (ledger, _, _) = ledger_at("2025-06-14T09:00:00Z");

        for expected in 1..=3 {
            let count = ledger
                .increment_within(&user(), MeteredAction::PhotoDiagnosis, 3)
                .await
                .unwrap();
            assert_eq!(count, Some(expected));
        }
        let refused = ledger
            .increment_within(&user(), MeteredAction::PhotoDiagnosis, 3)
            .await
            .unwrap();
        assert_eq!(refused, None);
    }

    #[tokio::test]
    async fn increment_fails_loudly_when_store_is_down() {
        let (ledger, store, _) = ledger_at("2025-06-14T09:00:00Z");
        store.set_unavailable(true);

        assert!(ledger.increment_ai_chat(&user()).await.is_err());
        assert!(ledger.get_current_usage(&user()).await.is_err());
    }
}
