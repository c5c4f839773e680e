//! PostgreSQL implementation of SubscriptionStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{
    BillingInterval, BillingRefs, Plan, SubscriptionRecord, SubscriptionStatus,
};
use crate::ports::{StoreError, SubscriptionStore};

use super::map_sqlx_error;

/// Subscriptions table backed by a shared connection pool.
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    user_id: String,
    plan: String,
    status: String,
    billing_interval: Option<String>,
    current_period_end: Option<DateTime<Utc>>,
    trial_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    billing_customer_id: Option<String>,
    billing_subscription_id: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = StoreError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: String| {
            StoreError::corrupt(format!("subscriptions.{} for {}: {}", field, row.user_id, e))
        };

        let plan = row
            .plan
            .parse::<Plan>()
            .map_err(|e| corrupt("plan", e.to_string()))?;
        let status = row
            .status
            .parse::<SubscriptionStatus>()
            .map_err(|e| corrupt("status", e.to_string()))?;
        let billing_interval = row
            .billing_interval
            .as_deref()
            .map(str::parse::<BillingInterval>)
            .transpose()
            .map_err(|e| corrupt("billing_interval", e.to_string()))?;
        let user_id =
            UserId::new(row.user_id.clone()).map_err(|e| corrupt("user_id", e.to_string()))?;

        Ok(SubscriptionRecord {
            user_id,
            plan,
            status,
            billing_interval,
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            trial_end: row.trial_end.map(Timestamp::from_datetime),
            cancel_at_period_end: row.cancel_at_period_end,
            billing_refs: BillingRefs {
                customer_id: row.billing_customer_id,
                subscription_id: row.billing_subscription_id,
            },
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT user_id, plan, status, billing_interval, current_period_end, trial_end,
           cancel_at_period_end, billing_customer_id, billing_subscription_id, updated_at
    FROM subscriptions
"#;

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn get_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("{} WHERE user_id = $1", SELECT_COLUMNS))
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn upsert_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                user_id, plan, status, billing_interval, current_period_end, trial_end,
                cancel_at_period_end, billing_customer_id, billing_subscription_id, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                plan = EXCLUDED.plan,
                status = EXCLUDED.status,
                billing_interval = EXCLUDED.billing_interval,
                current_period_end = EXCLUDED.current_period_end,
                trial_end = EXCLUDED.trial_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                billing_customer_id = EXCLUDED.billing_customer_id,
                billing_subscription_id = EXCLUDED.billing_subscription_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.user_id.as_str())
        .bind(record.plan.as_str())
        .bind(record.status.as_str())
        .bind(record.billing_interval.map(|i| i.as_str()))
        .bind(record.current_period_end.map(|t| *t.as_datetime()))
        .bind(record.trial_end.map(|t| *t.as_datetime()))
        .bind(record.cancel_at_period_end)
        .bind(record.billing_refs.customer_id.as_deref())
        .bind(record.billing_refs.subscription_id.as_deref())
        .bind(*record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_subscription", e))?;

        tracing::debug!(
            user_id = %record.user_id,
            plan = %record.plan,
            status = %record.status,
            "subscription upserted"
        );
        Ok(())
    }

    async fn find_by_billing_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE billing_subscription_id = $1",
            SELECT_COLUMNS
        ))
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_billing_subscription_id", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }
}
