//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence
//!
//! - `SubscriptionStore` - one subscription record per user
//! - `UsageStore` - per-user, per-period counters with atomic increment
//!
//! ## Runtime
//!
//! - `Clock` - the canonical "now"
//! - `SessionValidator` - bearer token validation
//! - `AssistantProvider` - the model behind the metered actions

mod assistant_provider;
mod clock;
mod session_validator;
mod store_error;
mod subscription_store;
mod usage_store;

pub use assistant_provider::{
    AssistantError, AssistantProvider, ChatReply, ChatRequest, ChatRole, ChatTurn, Diagnosis,
    DiagnosisRequest, PhotoSource,
};
pub use clock::Clock;
pub use session_validator::SessionValidator;
pub use store_error::StoreError;
pub use subscription_store::SubscriptionStore;
pub use usage_store::UsageStore;
