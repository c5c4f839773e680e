//! HTTP adapters - REST API implementations.
//!
//! Each use-case area has its own module with DTOs, handlers and routes;
//! [`api_router`] assembles them behind the auth middleware.

pub mod assistant;
pub mod error;
pub mod middleware;
mod router;
pub mod subscription;

pub use assistant::AssistantAppState;
pub use error::ErrorResponse;
pub use router::api_router;
pub use subscription::{BillingSettings, SubscriptionAppState};
