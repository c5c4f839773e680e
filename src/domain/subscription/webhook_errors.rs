//! Errors raised while processing billing webhooks.

use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// No signing secret is configured, so no event can be trusted.
    #[error("Webhook signing secret not configured")]
    NotConfigured,

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp is older than the accepted window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Header or payload could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A field the event type requires is missing.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// The event names a user we cannot resolve.
    #[error("Unknown subscriber: {0}")]
    UnknownSubscriber(String),

    /// The subscription store failed; the provider should redeliver.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl WebhookError {
    /// Returns true if the provider should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::StoreUnavailable(_) | WebhookError::NotConfigured
        )
    }
}
