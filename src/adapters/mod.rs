//! Adapters - Implementations of port interfaces.
//!
//! - `memory` - in-process stores for tests and local runs
//! - `postgres` - sqlx-backed subscription and usage stores
//! - `redis` - atomic usage counters
//! - `resilience` - timeout decorators around the store ports
//! - `auth` - session validators
//! - `ai` - assistant providers
//! - `http` - axum routes and middleware

pub mod ai;
pub mod auth;
mod clock;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod resilience;

pub use clock::{FixedClock, SystemClock};
