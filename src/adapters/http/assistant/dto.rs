//! HTTP DTOs for the assistant endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::ConsumeOutcome;
use crate::domain::subscription::Plan;
use crate::ports::{ChatTurn, PhotoSource};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestDto {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Exactly one of `imageBase64` or `imageUrl` must be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnoseRequestDto {
    pub image_base64: Option<String>,
    pub image_url: Option<String>,
    pub mime_type: Option<String>,
    pub notes: Option<String>,
}

impl DiagnoseRequestDto {
    pub fn photo_source(&self) -> Result<PhotoSource, String> {
        match (&self.image_base64, &self.image_url) {
            (Some(base64), None) => Ok(PhotoSource::Inline {
                base64: base64.clone(),
                mime_type: self
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "image/jpeg".to_string()),
            }),
            (None, Some(url)) => Ok(PhotoSource::Url(url.clone())),
            (Some(_), Some(_)) => Err("send either imageBase64 or imageUrl, not both".to_string()),
            (None, None) => Err("imageBase64 or imageUrl is required".to_string()),
        }
    }
}

/// Post-consumption usage. `remaining` is `null` for unbounded plans.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageAfter {
    pub count: u32,
    pub remaining: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub model: String,
    pub plan: Plan,
    pub usage: UsageAfter,
}

impl From<ConsumeOutcome<crate::ports::ChatReply>> for ChatResponse {
    fn from(outcome: ConsumeOutcome<crate::ports::ChatReply>) -> Self {
        Self {
            reply: outcome.output.content,
            model: outcome.output.model,
            plan: outcome.plan,
            usage: UsageAfter {
                count: outcome.new_count,
                remaining: outcome.remaining.as_option(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResponse {
    pub summary: String,
    pub model: String,
    pub plan: Plan,
    pub usage: UsageAfter,
}

impl From<ConsumeOutcome<crate::ports::Diagnosis>> for DiagnosisResponse {
    fn from(outcome: ConsumeOutcome<crate::ports::Diagnosis>) -> Self {
        Self {
            summary: outcome.output.summary,
            model: outcome.output.model,
            plan: outcome.plan,
            usage: UsageAfter {
                count: outcome.new_count,
                remaining: outcome.remaining.as_option(),
            },
        }
    }
}
