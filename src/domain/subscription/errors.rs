//! Subscription error types.

use std::fmt;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

use super::LifecycleState;

/// Errors raised while reading or changing a user's subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// No authenticated caller.
    Unauthorized,

    /// Caller is authenticated but not allowed to do this.
    Forbidden(String),

    /// Requested plan/interval/state is not recognized or not reachable.
    InvalidTransition { reason: String },

    /// Billing provider is not configured for the request.
    ConfigurationMissing(String),

    /// Subscription store could not be reached or timed out.
    StoreUnavailable(String),
}

impl SubscriptionError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        SubscriptionError::Forbidden(reason.into())
    }

    pub fn invalid_transition(reason: impl Into<String>) -> Self {
        SubscriptionError::InvalidTransition {
            reason: reason.into(),
        }
    }

    /// Lifecycle edge not present in the state machine.
    pub fn unreachable_state(from: LifecycleState, to: LifecycleState) -> Self {
        SubscriptionError::InvalidTransition {
            reason: format!("cannot move subscription from {} to {}", from, to),
        }
    }

    pub fn configuration_missing(what: impl Into<String>) -> Self {
        SubscriptionError::ConfigurationMissing(what.into())
    }

    pub fn store_unavailable(reason: impl Into<String>) -> Self {
        SubscriptionError::StoreUnavailable(reason.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SubscriptionError::Unauthorized => ErrorCode::Unauthorized,
            SubscriptionError::Forbidden(_) => ErrorCode::Forbidden,
            SubscriptionError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            SubscriptionError::ConfigurationMissing(_) => ErrorCode::ConfigurationMissing,
            SubscriptionError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
        }
    }

    /// Returns a user-facing message.
    pub fn message(&self) -> String {
        match self {
            SubscriptionError::Unauthorized => "Authentication required".to_string(),
            SubscriptionError::Forbidden(reason) => format!("Forbidden: {}", reason),
            SubscriptionError::InvalidTransition { reason } => {
                format!("Invalid subscription change: {}", reason)
            }
            SubscriptionError::ConfigurationMissing(what) => {
                format!("Billing is not configured: {}", what)
            }
            SubscriptionError::StoreUnavailable(_) => {
                "Subscription service is temporarily unavailable".to_string()
            }
        }
    }

    /// Returns true if the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubscriptionError::StoreUnavailable(_))
    }
}

impl fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionError::StoreUnavailable(reason) => {
                write!(f, "subscription store unavailable: {}", reason)
            }
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for SubscriptionError {}

impl From<ValidationError> for SubscriptionError {
    fn from(err: ValidationError) -> Self {
        SubscriptionError::invalid_transition(err.to_string())
    }
}

impl From<SubscriptionError> for DomainError {
    fn from(err: SubscriptionError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
