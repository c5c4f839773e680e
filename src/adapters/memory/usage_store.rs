//! In-memory usage store for tests and single-process development.
//!
//! Each increment runs under one write lock, which is this store's atomic
//! primitive. Reads never insert.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::UserId;
use crate::domain::usage::{BillingPeriod, MeteredAction, UsageRecord};
use crate::ports::{StoreError, UsageStore};

type UsageKey = (UserId, NaiveDate);

#[derive(Debug, Default, Clone)]
pub struct InMemoryUsageStore {
    rows: Arc<RwLock<HashMap<UsageKey, UsageRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Direct inspection: does a row exist for this key?
    pub async fn contains(&self, user_id: &UserId, period_start: NaiveDate) -> bool {
        self.rows
            .read()
            .await
            .contains_key(&(user_id.clone(), period_start))
    }

    /// Number of materialized rows across all users and periods.
    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::unavailable("in-memory usage store offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn get_usage(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<Option<UsageRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .rows
            .read()
            .await
            .get(&(user_id.clone(), period_start))
            .cloned())
    }

    async fn atomic_increment(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        action: MeteredAction,
    ) -> Result<u32, StoreError> {
        self.check_available()?;
        let mut rows = self.rows.write().await;
        let row = rows
            .entry((user_id.clone(), period_start))
            .or_insert_with(|| {
                UsageRecord::zero(user_id.clone(), BillingPeriod::starting(period_start))
            });
        let next = row.count_for(action).saturating_add(1);
        *row = row.clone().with_count(action, next);
        Ok(next)
    }

    async fn atomic_increment_capped(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        action: MeteredAction,
        cap: u32,
    ) -> Result<Option<u32>, StoreError> {
        self.check_available()?;
        let mut rows = self.rows.write().await;
        let key = (user_id.clone(), period_start);
        let current = rows.get(&key).map_or(0, |row| row.count_for(action));
        if current >= cap {
            return Ok(None);
        }

        let row = rows.entry(key).or_insert_with(|| {
            UsageRecord::zero(user_id.clone(), BillingPeriod::starting(period_start))
        });
        let next = current + 1;
        *row = row.clone().with_count(action, next);
        Ok(Some(next))
    }
}
