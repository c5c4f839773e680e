//! Errors shared by the persistence ports.

use std::time::Duration;
use thiserror::Error;

use crate::domain::subscription::{SubscriptionError, WebhookError};

/// Failure talking to a subscription or usage store.
///
/// Every variant is an availability problem from the caller's point of view:
/// reads degrade to free tier and zero usage, writes are reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backend refused or dropped the connection.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within the configured budget.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// A stored row could not be mapped to a domain record.
    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::Unavailable(reason.into())
    }

    pub fn corrupt(reason: impl Into<String>) -> Self {
        StoreError::Corrupt(reason.into())
    }
}

impl From<StoreError> for SubscriptionError {
    fn from(err: StoreError) -> Self {
        SubscriptionError::store_unavailable(err.to_string())
    }
}

impl From<StoreError> for WebhookError {
    fn from(err: StoreError) -> Self {
        WebhookError::StoreUnavailable(err.to_string())
    }
}
