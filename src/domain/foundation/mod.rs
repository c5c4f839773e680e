//! Foundation module - Shared domain primitives.
//!
//! Identifiers, time, errors and the state machine trait used by the
//! subscription, usage and entitlement modules.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser, Role};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::UserId;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
