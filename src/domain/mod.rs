//! Domain layer - pure types and rules with no I/O.

pub mod entitlement;
pub mod foundation;
pub mod subscription;
pub mod usage;
