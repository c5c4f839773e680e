//! Redis adapters.

mod usage_store;

pub use usage_store::RedisUsageStore;
