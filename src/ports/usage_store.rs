//! Usage store port.
//!
//! Counters are keyed by `(user_id, period_start)`. The only mutation is an
//! atomic increment performed by the storage engine itself (upsert-increment,
//! `HINCRBY`, or a single locked update); never read-add-write in the
//! application.
//!
//! # Contract
//!
//! - `get_usage` is a pure read. It must not create a row.
//! - `atomic_increment` creates the row at zero and increments it in the same
//!   atomic step, returning the post-increment count.
//! - `atomic_increment_capped` does the same only while the stored count is
//!   below `cap`, returning `None` once the cap is reached.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::foundation::UserId;
use crate::domain::usage::{MeteredAction, UsageRecord};

use super::StoreError;

#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn get_usage(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<Option<UsageRecord>, StoreError>;

    async fn atomic_increment(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        action: MeteredAction,
    ) -> Result<u32, StoreError>;

    async fn atomic_increment_capped(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        action: MeteredAction,
        cap: u32,
    ) -> Result<Option<u32>, StoreError>;
}
