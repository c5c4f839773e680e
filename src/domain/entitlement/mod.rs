//! Entitlement evaluation: who may consume which metered action.

mod evaluator;

pub use evaluator::{evaluate, EffectiveTier, EntitlementDecision, Quota};
