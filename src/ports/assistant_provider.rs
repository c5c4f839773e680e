//! Assistant provider port.
//!
//! The two metered actions are calls to an external model: a lawn-care chat
//! turn and a photo diagnosis. The admission gate wraps these calls; the
//! provider itself knows nothing about quotas.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[async_trait]
pub trait AssistantProvider: Send + Sync {
    /// Answers one chat turn given the prior conversation.
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, AssistantError>;

    /// Diagnoses a lawn problem from a photo.
    async fn diagnose(&self, request: DiagnosisRequest) -> Result<Diagnosis, AssistantError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// Earlier turns, oldest first.
    pub history: Vec<ChatTurn>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub content: String,
    pub model: String,
}

/// Where the photo comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSource {
    /// Base64 image bytes with their MIME type.
    Inline { base64: String, mime_type: String },
    /// Publicly fetchable URL.
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisRequest {
    pub photo: PhotoSource,
    /// Free-form context from the user ("brown patches near the fence").
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub summary: String,
    pub model: String,
}

/// Provider failures. None of these consume quota.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistantError {
    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("authentication with provider failed")]
    AuthenticationFailed,

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AssistantError {
    /// Returns true if the caller should retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AssistantError::RateLimited
                | AssistantError::Unavailable(_)
                | AssistantError::Timeout(_)
        )
    }
}
