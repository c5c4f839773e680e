//! Clock port.
//!
//! Period boundaries and transition dates are derived from this clock, so
//! tests can pin "now" to a month edge.

use crate::domain::foundation::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}
