//! In-memory subscription store for tests and single-process development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::UserId;
use crate::domain::subscription::SubscriptionRecord;
use crate::ports::{StoreError, SubscriptionStore};

/// Subscription records held in a `HashMap` keyed by user.
///
/// Can be switched into an unavailable mode to exercise outage handling.
#[derive(Debug, Default, Clone)]
pub struct InMemorySubscriptionStore {
    records: Arc<RwLock<HashMap<UserId, SubscriptionRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seeds a record directly, bypassing the transition handler.
    pub async fn insert(&self, record: SubscriptionRecord) {
        self.records.write().await.insert(record.user_id.clone(), record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::unavailable("in-memory subscription store offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        self.check_available()?;
        Ok(self.records.read().await.get(user_id).cloned())
    }

    async fn upsert_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        self.check_available()?;
        self.records
            .write()
            .await
            .insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn find_by_billing_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.billing_refs.subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }
}
