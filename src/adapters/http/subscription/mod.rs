//! HTTP adapter for subscription endpoints.
//!
//! - `GET /subscription/status` - plan, status, usage and quotas
//! - `POST /subscription/transition` - self-service upgrade or admin override
//! - `POST /subscription/cancel` - immediate or end-of-period cancellation
//! - `POST /webhooks/billing` - signed billing provider events

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{BillingSettings, SubscriptionAppState, SIGNATURE_HEADER};
pub use routes::{subscription_routes, webhook_routes};
