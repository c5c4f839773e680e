//! Resilience wrappers around outbound ports.

mod timeout;

pub use timeout::{TimeoutSubscriptionStore, TimeoutUsageStore, DEFAULT_STORE_TIMEOUT};
