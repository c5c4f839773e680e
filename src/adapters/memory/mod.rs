//! In-memory store adapters.

mod subscription_store;
mod usage_store;

pub use subscription_store::InMemorySubscriptionStore;
pub use usage_store::InMemoryUsageStore;
