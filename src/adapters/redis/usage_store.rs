//! Redis-backed usage counters.
//!
//! Each `(user, period)` pair is one hash at `usage:{user_id}:{YYYY-MM-DD}`
//! with one field per metered action. `HINCRBY` creates the hash and field
//! at zero and increments atomically. The capped variant runs as a Lua
//! script so the compare and the increment happen in one server step.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::UserId;
use crate::domain::usage::{BillingPeriod, MeteredAction, UsageRecord};
use crate::ports::{StoreError, UsageStore};

/// Returns -1 when the field is already at or above the cap.
const CAPPED_INCREMENT_LUA: &str = r#"
local current = tonumber(redis.call('HGET', KEYS[1], ARGV[1]) or '0')
local cap = tonumber(ARGV[2])
if current >= cap then
    return -1
end
return redis.call('HINCRBY', KEYS[1], ARGV[1], 1)
"#;

/// Usage store for deployments that keep counters in Redis.
///
/// Counter hashes are never expired: past periods stay readable.
#[derive(Clone)]
pub struct RedisUsageStore {
    conn: MultiplexedConnection,
    capped_increment: redis::Script,
}

impl RedisUsageStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            capped_increment: redis::Script::new(CAPPED_INCREMENT_LUA),
        }
    }
}

impl std::fmt::Debug for RedisUsageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisUsageStore").finish_non_exhaustive()
    }
}

fn usage_key(user_id: &UserId, period_start: NaiveDate) -> String {
    format!("usage:{}:{}", user_id, period_start.format("%Y-%m-%d"))
}

fn unavailable(operation: &str, err: redis::RedisError) -> StoreError {
    tracing::warn!(operation, error = %err, "redis call failed");
    StoreError::unavailable(format!("{}: {}", operation, err))
}

fn to_count(field: &str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::corrupt(format!("usage field {} holds {}", field, value)))
}

/// Maps a counter hash onto a record. An empty hash means no record.
fn record_from_hash(
    user_id: &UserId,
    period_start: NaiveDate,
    fields: HashMap<String, i64>,
) -> Result<Option<UsageRecord>, StoreError> {
    if fields.is_empty() {
        return Ok(None);
    }

    let mut record = UsageRecord::zero(user_id.clone(), BillingPeriod::starting(period_start));
    for action in MeteredAction::ALL {
        let field = action.counter_field();
        let count = match fields.get(field) {
            Some(value) => to_count(field, *value)?,
            None => 0,
        };
        record = record.with_count(action, count);
    }
    Ok(Some(record))
}

#[async_trait]
impl UsageStore for RedisUsageStore {
    async fn get_usage(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<Option<UsageRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, i64> = conn
            .hgetall(usage_key(user_id, period_start))
            .await
            .map_err(|e: redis::RedisError| unavailable("get_usage", e))?;

        record_from_hash(user_id, period_start, fields)
    }

    async fn atomic_increment(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        action: MeteredAction,
    ) -> Result<u32, StoreError> {
        let mut conn = self.conn.clone();
        let count: i64 = conn
            .hincr(usage_key(user_id, period_start), action.counter_field(), 1_i64)
            .await
            .map_err(|e: redis::RedisError| unavailable("atomic_increment", e))?;

        to_count(action.counter_field(), count)
    }

    async fn atomic_increment_capped(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        action: MeteredAction,
        cap: u32,
    ) -> Result<Option<u32>, StoreError> {
        let mut conn = self.conn.clone();
        let count: i64 = self
            .capped_increment
            .key(usage_key(user_id, period_start))
            .arg(action.counter_field())
            .arg(cap)
            .invoke_async(&mut conn)
            .await
            .map_err(|e: redis::RedisError| unavailable("atomic_increment_capped", e))?;

        if count < 0 {
            return Ok(None);
        }
        to_count(action.counter_field(), count).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("user-7").unwrap()
    }

    fn june() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn key_embeds_user_and_period() {
        assert_eq!(usage_key(&user(), june()), "usage:user-7:2025-06-01");
    }

    #[test]
    fn empty_hash_is_no_record() {
        assert!(record_from_hash(&user(), june(), HashMap::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let fields = HashMap::from([("photo_diagnosis_count".to_string(), 2_i64)]);
        let record = record_from_hash(&user(), june(), fields).unwrap().unwrap();
        assert_eq!(record.ai_chat_count, 0);
        assert_eq!(record.photo_diagnosis_count, 2);
    }

    #[test]
    fn negative_field_is_corrupt() {
        let fields = HashMap::from([("ai_chat_count".to_string(), -3_i64)]);
        assert!(matches!(
            record_from_hash(&user(), june(), fields),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn script_refuses_at_cap() {
        assert!(CAPPED_INCREMENT_LUA.contains("current >= cap"));
        assert!(CAPPED_INCREMENT_LUA.contains("HINCRBY"));
    }
}
