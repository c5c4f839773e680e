//! Usage metering: the ledger and the admission gate in front of it.

mod admission_gate;
mod usage_ledger;

pub use admission_gate::{AdmissionError, AdmissionGate, ConsumeOutcome};
pub use usage_ledger::UsageLedger;
