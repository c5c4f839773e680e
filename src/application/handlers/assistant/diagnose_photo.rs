//! DiagnosePhotoHandler - one metered photo diagnosis.

use std::sync::Arc;

use crate::application::handlers::usage::{AdmissionError, AdmissionGate, ConsumeOutcome};
use crate::domain::foundation::UserId;
use crate::domain::usage::MeteredAction;
use crate::ports::{AssistantError, AssistantProvider, Diagnosis, DiagnosisRequest, PhotoSource};

/// Accepted inline image types.
pub const SUPPORTED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
/// Inline payload ceiling, base64 characters (about 7.5 MB decoded).
pub const MAX_INLINE_BASE64_LEN: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct DiagnosePhotoCommand {
    pub user_id: UserId,
    pub photo: PhotoSource,
    pub notes: Option<String>,
}

pub struct DiagnosePhotoHandler {
    gate: Arc<AdmissionGate>,
    provider: Arc<dyn AssistantProvider>,
}

impl DiagnosePhotoHandler {
    pub fn new(gate: Arc<AdmissionGate>, provider: Arc<dyn AssistantProvider>) -> Self {
        Self { gate, provider }
    }

    pub async fn handle(
        &self,
        cmd: DiagnosePhotoCommand,
    ) -> Result<ConsumeOutcome<Diagnosis>, AdmissionError<AssistantError>> {
        validate_photo(&cmd.photo).map_err(AdmissionError::Action)?;

        let request = DiagnosisRequest {
            photo: cmd.photo,
            notes: cmd
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        };

        let provider = self.provider.clone();
        self.gate
            .try_consume(&cmd.user_id, MeteredAction::PhotoDiagnosis, move || async move {
                provider.diagnose(request).await
            })
            .await
    }
}

fn validate_photo(photo: &PhotoSource) -> Result<(), AssistantError> {
    match photo {
        PhotoSource::Inline { base64, mime_type } => {
            if base64.is_empty() {
                return Err(AssistantError::InvalidRequest("image is empty".to_string()));
            }
            if base64.len() > MAX_INLINE_BASE64_LEN {
                return Err(AssistantError::InvalidRequest("image is too large".to_string()));
            }
            if !SUPPORTED_MIME_TYPES.contains(&mime_type.as_str()) {
                return Err(AssistantError::InvalidRequest(format!(
                    "unsupported image type {}",
                    mime_type
                )));
            }
            Ok(())
        }
        PhotoSource::Url(url) => {
            if url.starts_with("https://") || url.starts_with("http://") {
                Ok(())
            } else {
                Err(AssistantError::InvalidRequest(
                    "image url must be http(s)".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockAssistantProvider;
    use crate::adapters::memory::{InMemorySubscriptionStore, InMemoryUsageStore};
    use crate::adapters::FixedClock;
    use crate::application::handlers::usage::UsageLedger;
    use crate::domain::entitlement::Quota;
    use crate::domain::subscription::fixtures::ts;
    use crate::domain::usage::FreeTierLimits;

    fn handler(provider: MockAssistantProvider) -> DiagnosePhotoHandler {
        let ledger = Arc::new(UsageLedger::new(
            Arc::new(InMemoryUsageStore::new()),
            Arc::new(FixedClock::new(ts("2025-06-05T00:00:00Z"))),
        ));
        let gate = Arc::new(AdmissionGate::new(
            Arc::new(InMemorySubscriptionStore::new()),
            ledger,
            FreeTierLimits::default(),
        ));
        DiagnosePhotoHandler::new(gate, Arc::new(provider))
    }

    fn inline(mime: &str) -> DiagnosePhotoCommand {
        DiagnosePhotoCommand {
            user_id: UserId::new("user-1").unwrap(),
            photo: PhotoSource::Inline {
                base64: "iVBORw0KGgo=".to_string(),
                mime_type: mime.to_string(),
            },
            notes: Some("  yellow patches  ".to_string()),
        }
    }

    #[tokio::test]
    async fn diagnoses_and_reports_remaining_quota() {
        let handler = handler(MockAssistantProvider::new());

        let outcome = handler.handle(inline("image/png")).await.unwrap();

        assert_eq!(outcome.output.summary, "mock diagnosis (yellow patches)");
        assert_eq!(outcome.remaining, Quota::Limited(2));
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected_without_provider_call() {
        let provider = MockAssistantProvider::new();
        let handler = handler(provider.clone());

        let result = handler.handle(inline("image/gif")).await;
        assert!(matches!(
            result,
            Err(AdmissionError::Action(AssistantError::InvalidRequest(_)))
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn url_must_be_http() {
        assert!(validate_photo(&PhotoSource::Url("https://cdn.example/lawn.jpg".into())).is_ok());
        assert!(validate_photo(&PhotoSource::Url("file:///etc/passwd".into())).is_err());
    }
}
