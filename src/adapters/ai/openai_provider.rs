//! OpenAI-compatible chat completions client for the `AssistantProvider` port.
//!
//! Both actions go through `POST {base_url}/chat/completions`. Photo
//! diagnosis sends the image as an `image_url` content part, which any
//! vision-capable, OpenAI-compatible endpoint accepts.
//!
//! ```ignore
//! let provider = OpenAIProvider::new(
//!     OpenAIConfig::new(api_key).with_model("gpt-4o-mini"),
//! )?;
//! ```

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AssistantError, AssistantProvider, ChatReply, ChatRequest, ChatRole, Diagnosis,
    DiagnosisRequest, PhotoSource,
};

const CHAT_SYSTEM_PROMPT: &str = "You are a lawn care assistant. Give practical, \
    season-aware advice on mowing, watering, fertilizing, weeds, pests and turf disease. \
    Keep answers short and ask for grass type or region when it matters.";

const DIAGNOSIS_SYSTEM_PROMPT: &str = "You diagnose lawn problems from photos. Name the \
    most likely cause, how confident you are, and the first two steps to fix it. If the \
    photo does not show turf, say so.";

/// Configuration for the OpenAI-compatible provider.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    api_key: Secret<String>,
    pub model: String,
    /// Base URL without trailing path (default: https://api.openai.com/v1).
    pub base_url: String,
    pub timeout: Duration,
    /// Retries on rate limiting and server errors.
    pub max_retries: u32,
    pub max_tokens: u32,
}

impl OpenAIConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            max_tokens: 800,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

pub struct OpenAIProvider {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AssistantError::Unavailable(format!("http client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn chat_body(&self, request: &ChatRequest) -> CompletionBody {
        let mut messages = vec![WireMessage::text("system", CHAT_SYSTEM_PROMPT)];
        messages.extend(request.history.iter().map(|turn| {
            let role = match turn.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            WireMessage::text(role, &turn.content)
        }));
        messages.push(WireMessage::text("user", &request.message));

        CompletionBody {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
        }
    }

    fn diagnosis_body(&self, request: &DiagnosisRequest) -> CompletionBody {
        let url = match &request.photo {
            PhotoSource::Inline { base64, mime_type } => {
                format!("data:{};base64,{}", mime_type, base64)
            }
            PhotoSource::Url(url) => url.clone(),
        };
        let prompt = match &request.notes {
            Some(notes) => format!("What is wrong with this lawn? Notes from the owner: {}", notes),
            None => "What is wrong with this lawn?".to_string(),
        };

        CompletionBody {
            model: self.config.model.clone(),
            messages: vec![
                WireMessage::text("system", DIAGNOSIS_SYSTEM_PROMPT),
                WireMessage {
                    role: "user".to_string(),
                    content: WireContent::Parts(vec![
                        ContentPart::Text { text: prompt },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url },
                        },
                    ]),
                },
            ],
            max_tokens: self.config.max_tokens,
        }
    }

    async fn send(&self, body: &CompletionBody) -> Result<Response, AssistantError> {
        self.client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AssistantError::Timeout(self.config.timeout.as_secs())
                } else {
                    AssistantError::Unavailable(e.to_string())
                }
            })
    }

    async fn complete_once(
        &self,
        body: &CompletionBody,
    ) -> Result<(String, String), AssistantError> {
        let response = self.send(body).await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), error_body));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Parse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AssistantError::Parse("no content in response".to_string()))?;

        Ok((content, parsed.model))
    }

    /// Runs one completion with exponential backoff on retryable failures.
    async fn complete(&self, body: CompletionBody) -> Result<(String, String), AssistantError> {
        let mut attempt = 0;
        loop {
            match self.complete_once(&body).await {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    tracing::debug!(attempt, error = %err, "retrying assistant call");
                    sleep(Duration::from_millis(500 << attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn map_status(status: u16, body: String) -> AssistantError {
    match status {
        401 | 403 => AssistantError::AuthenticationFailed,
        429 => AssistantError::RateLimited,
        400 | 404 | 422 => AssistantError::InvalidRequest(body),
        _ => AssistantError::Unavailable(format!("status {}: {}", status, body)),
    }
}

#[async_trait]
impl AssistantProvider for OpenAIProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, AssistantError> {
        let (content, model) = self.complete(self.chat_body(&request)).await?;
        Ok(ChatReply { content, model })
    }

    async fn diagnose(&self, request: DiagnosisRequest) -> Result<Diagnosis, AssistantError> {
        let (summary, model) = self.complete(self.diagnosis_body(&request)).await?;
        Ok(Diagnosis { summary, model })
    }
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct CompletionBody {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: WireContent,
}

impl WireMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: WireContent::Text(content.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
