//! Greenkeep - usage metering and subscription entitlements for the
//! lawn-care assistant.
//!
//! Free users get a monthly quota of AI chat messages and photo diagnoses;
//! pro users are unbounded. Every metered call passes through the
//! [`AdmissionGate`](application::handlers::AdmissionGate), which only counts
//! calls the assistant provider actually answered.

pub mod adapters;
pub mod application;
mod app;
pub mod config;
pub mod domain;
pub mod ports;

pub use app::{build_router, AppDependencies};
