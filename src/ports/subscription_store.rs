//! Subscription store port.
//!
//! One record per user, keyed by `user_id`. Absence of a record means the
//! user is on the free plan; stores never materialize a record on read.

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::domain::subscription::SubscriptionRecord;

use super::StoreError;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Returns the user's record, or `None` if they have never subscribed.
    async fn get_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, StoreError>;

    /// Inserts or replaces the record keyed by `record.user_id`.
    async fn upsert_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError>;

    /// Looks up a record by the billing provider's subscription id.
    ///
    /// Used when a webhook carries no user reference.
    async fn find_by_billing_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError>;
}
