//! PostgreSQL implementation of UsageStore.
//!
//! Increments are single `INSERT .. ON CONFLICT DO UPDATE .. RETURNING`
//! statements, so the row is created and incremented in one atomic step and
//! concurrent requests serialize on the row lock.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::domain::foundation::UserId;
use crate::domain::usage::{MeteredAction, UsageRecord};
use crate::ports::{StoreError, UsageStore};

use super::map_sqlx_error;

pub struct PostgresUsageStore {
    pool: PgPool,
}

impl PostgresUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    user_id: String,
    period_start: NaiveDate,
    ai_chat_count: i32,
    photo_diagnosis_count: i32,
}

impl TryFrom<UsageRow> for UsageRecord {
    type Error = StoreError;

    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        Ok(UsageRecord {
            user_id: UserId::new(row.user_id.clone())
                .map_err(|e| StoreError::corrupt(format!("usage_records.user_id: {}", e)))?,
            period_start: row.period_start,
            ai_chat_count: to_count(row.ai_chat_count)?,
            photo_diagnosis_count: to_count(row.photo_diagnosis_count)?,
        })
    }
}

fn to_count(value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::corrupt(format!("negative usage count {}", value)))
}

/// Upsert-increment for one counter column.
///
/// The column name comes from a closed enum, never from input.
fn increment_sql(action: MeteredAction) -> String {
    let column = action.counter_field();
    format!(
        r#"
        INSERT INTO usage_records (user_id, period_start, {column})
        VALUES ($1, $2, 1)
        ON CONFLICT (user_id, period_start) DO UPDATE
            SET {column} = usage_records.{column} + 1,
                updated_at = now()
        RETURNING {column}
        "#,
        column = column
    )
}

/// Same as [`increment_sql`], applied only while the stored count is below `$3`.
///
/// With a zero cap the `INSERT .. SELECT .. WHERE` inserts nothing, so no row
/// is materialized for a denied request.
fn capped_increment_sql(action: MeteredAction) -> String {
    let column = action.counter_field();
    format!(
        r#"
        INSERT INTO usage_records (user_id, period_start, {column})
        SELECT $1, $2, 1
        WHERE $3::int > 0
        ON CONFLICT (user_id, period_start) DO UPDATE
            SET {column} = usage_records.{column} + 1,
                updated_at = now()
            WHERE usage_records.{column} < $3::int
        RETURNING {column}
        "#,
        column = column
    )
}

#[async_trait]
impl UsageStore for PostgresUsageStore {
    async fn get_usage(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<Option<UsageRecord>, StoreError> {
        let row: Option<UsageRow> = sqlx::query_as(
            r#"
            SELECT user_id, period_start, ai_chat_count, photo_diagnosis_count
            FROM usage_records
            WHERE user_id = $1 AND period_start = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(period_start)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_usage", e))?;

        row.map(UsageRecord::try_from).transpose()
    }

    async fn atomic_increment(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        action: MeteredAction,
    ) -> Result<u32, StoreError> {
        let count: i32 = sqlx::query_scalar(&increment_sql(action))
            .bind(user_id.as_str())
            .bind(period_start)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("atomic_increment", e))?;

        to_count(count)
    }

    async fn atomic_increment_capped(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        action: MeteredAction,
        cap: u32,
    ) -> Result<Option<u32>, StoreError> {
        let cap = i32::try_from(cap).unwrap_or(i32::MAX);
        let count: Option<i32> = sqlx::query_scalar(&capped_increment_sql(action))
            .bind(user_id.as_str())
            .bind(period_start)
            .bind(cap)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("atomic_increment_capped", e))?;

        count.map(to_count).transpose()
    }
}
