//! Timeout decorators for the store ports.
//!
//! Every store call made by the application goes through one of these
//! wrappers, so a latent backend surfaces as `StoreError::Timeout` within the
//! configured budget instead of hanging a request.
//!
//! # Example
//!
//! ```ignore
//! let usage: Arc<dyn UsageStore> = Arc::new(TimeoutUsageStore::new(
//!     Arc::new(PostgresUsageStore::new(pool.clone())),
//!     Duration::from_secs(5),
//! ));
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::UserId;
use crate::domain::subscription::SubscriptionRecord;
use crate::domain::usage::{MeteredAction, UsageRecord};
use crate::ports::{StoreError, SubscriptionStore, UsageStore};

/// Default and recommended upper bound for a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

async fn bounded<T, F>(budget: Duration, operation: &'static str, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, budget_ms = budget.as_millis() as u64, "store call timed out");
            Err(StoreError::Timeout(budget))
        }
    }
}

/// Applies a per-call timeout to any `SubscriptionStore`.
pub struct TimeoutSubscriptionStore {
    inner: Arc<dyn SubscriptionStore>,
    budget: Duration,
}

impl TimeoutSubscriptionStore {
    pub fn new(inner: Arc<dyn SubscriptionStore>, budget: Duration) -> Self {
        Self { inner, budget }
    }
}

#[async_trait]
impl SubscriptionStore for TimeoutSubscriptionStore {
    async fn get_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        bounded(self.budget, "get_subscription", self.inner.get_subscription(user_id)).await
    }

    async fn upsert_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        bounded(self.budget, "upsert_subscription", self.inner.upsert_subscription(record)).await
    }

    async fn find_by_billing_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        bounded(
            self.budget,
            "find_by_billing_subscription_id",
            self.inner.find_by_billing_subscription_id(subscription_id),
        )
        .await
    }
}

/// Applies a per-call timeout to any `UsageStore`.
///
/// A timed-out increment may still have been applied by the backend; callers
/// re-read usage before retrying.
pub struct TimeoutUsageStore {
    inner: Arc<dyn UsageStore>,
    budget: Duration,
}

impl TimeoutUsageStore {
    pub fn new(inner: Arc<dyn UsageStore>, budget: Duration) -> Self {
        Self { inner, budget }
    }
}

#[async_trait]
impl UsageStore for TimeoutUsageStore {
    async fn get_usage(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<Option<UsageRecord>, StoreError> {
        bounded(self.budget, "get_usage", self.inner.get_usage(user_id, period_start)).await
    }

    async fn atomic_increment(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        action: MeteredAction,
    ) -> Result<u32, StoreError> {
        bounded(
            self.budget,
            "atomic_increment",
            self.inner.atomic_increment(user_id, period_start, action),
        )
        .await
    }

    async fn atomic_increment_capped(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        action: MeteredAction,
        cap: u32,
    ) -> Result<Option<u32>, StoreError> {
        bounded(
            self.budget,
            "atomic_increment_capped",
            self.inner
                .atomic_increment_capped(user_id, period_start, action, cap),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryUsageStore;

    /// A store whose reads never complete.
    struct HangingUsageStore;

    #[async_trait]
    impl UsageStore for HangingUsageStore {
        async fn get_usage(
            &self,
            _user_id: &UserId,
            _period_start: NaiveDate,
        ) -> Result<Option<UsageRecord>, StoreError> {
            std::future::pending().await
        }

        async fn atomic_increment(
            &self,
            _user_id: &UserId,
            _period_start: NaiveDate,
            _action: MeteredAction,
        ) -> Result<u32, StoreError> {
            std::future::pending().await
        }

        async fn atomic_increment_capped(
            &self,
            _user_id: &UserId,
            _period_start: NaiveDate,
            _action: MeteredAction,
            _cap: u32,
        ) -> Result<Option<u32>, StoreError> {
            std::future::pending().await
        }
    }

    fn june() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn hanging_store_times_out_with_budget() {
        let budget = Duration::from_millis(20);
        let store = TimeoutUsageStore::new(Arc::new(HangingUsageStore), budget);
        let err = store
            .get_usage(&UserId::new("u1").unwrap(), june())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Timeout(budget));
    }

    #[tokio::test]
    async fn fast_store_passes_through() {
        let inner = InMemoryUsageStore::new();
        let store = TimeoutUsageStore::new(Arc::new(inner.clone()), DEFAULT_STORE_TIMEOUT);
        let user = UserId::new("u1").unwrap();

        let count = store
            .atomic_increment(&user, june(), MeteredAction::AiChat)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(inner.contains(&user, june()).await);
    }
}
