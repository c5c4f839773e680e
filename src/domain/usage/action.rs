//! Metered actions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A user-initiated operation counted against the plan's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeteredAction {
    AiChat,
    PhotoDiagnosis,
}

impl MeteredAction {
    pub const ALL: [MeteredAction; 2] = [MeteredAction::AiChat, MeteredAction::PhotoDiagnosis];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeteredAction::AiChat => "ai_chat",
            MeteredAction::PhotoDiagnosis => "photo_diagnosis",
        }
    }

    /// Counter column/field name in the usage stores.
    pub fn counter_field(&self) -> &'static str {
        match self {
            MeteredAction::AiChat => "ai_chat_count",
            MeteredAction::PhotoDiagnosis => "photo_diagnosis_count",
        }
    }

    /// Human label used in upgrade prompts.
    pub fn label(&self) -> &'static str {
        match self {
            MeteredAction::AiChat => "AI chat messages",
            MeteredAction::PhotoDiagnosis => "photo diagnoses",
        }
    }
}

impl fmt::Display for MeteredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_wire_names() {
        assert_eq!(serde_json::to_string(&MeteredAction::AiChat).unwrap(), "\"ai_chat\"");
        assert_eq!(
            serde_json::to_string(&MeteredAction::PhotoDiagnosis).unwrap(),
            "\"photo_diagnosis\""
        );
    }

    #[test]
    fn counter_fields_are_distinct() {
        assert_ne!(
            MeteredAction::AiChat.counter_field(),
            MeteredAction::PhotoDiagnosis.counter_field()
        );
    }
}
