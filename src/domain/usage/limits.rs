//! Free-tier quota configuration.

use serde::{Deserialize, Serialize};

use super::MeteredAction;

/// Per-period quotas applied to users without pro entitlements.
///
/// Loaded once at startup from the `limits` config section
/// (`GREENKEEP__LIMITS__AI_CHAT_LIMIT`, `GREENKEEP__LIMITS__PHOTO_DIAGNOSIS_LIMIT`)
/// and passed by value thereafter.
///
/// | Action          | Default |
/// |-----------------|---------|
/// | ai_chat         | 5       |
/// | photo_diagnosis | 3       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeTierLimits {
    #[serde(default = "default_ai_chat_limit", alias = "AI_CHAT_LIMIT")]
    pub ai_chat_limit: u32,

    #[serde(default = "default_photo_diagnosis_limit", alias = "PHOTO_DIAGNOSIS_LIMIT")]
    pub photo_diagnosis_limit: u32,
}

fn default_ai_chat_limit() -> u32 {
    5
}

fn default_photo_diagnosis_limit() -> u32 {
    3
}

impl Default for FreeTierLimits {
    fn default() -> Self {
        Self {
            ai_chat_limit: default_ai_chat_limit(),
            photo_diagnosis_limit: default_photo_diagnosis_limit(),
        }
    }
}

impl FreeTierLimits {
    pub fn new(ai_chat_limit: u32, photo_diagnosis_limit: u32) -> Self {
        Self {
            ai_chat_limit,
            photo_diagnosis_limit,
        }
    }

    pub fn limit_for(&self, action: MeteredAction) -> u32 {
        match action {
            MeteredAction::AiChat => self.ai_chat_limit,
            MeteredAction::PhotoDiagnosis => self.photo_diagnosis_limit,
        }
    }
}
