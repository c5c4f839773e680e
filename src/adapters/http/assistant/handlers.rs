//! HTTP handlers for the metered assistant endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::adapters::http::error::{bad_request, parse_body, ErrorResponse};
use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::{
    AdmissionError, DiagnosePhotoCommand, DiagnosePhotoHandler, SendChatMessageCommand,
    SendChatMessageHandler,
};
use crate::domain::foundation::ErrorCode;
use crate::ports::AssistantError;

use super::dto::{ChatRequestDto, ChatResponse, DiagnoseRequestDto, DiagnosisResponse};

#[derive(Clone)]
pub struct AssistantAppState {
    pub chat: Arc<SendChatMessageHandler>,
    pub diagnose: Arc<DiagnosePhotoHandler>,
}

/// POST /assistant/chat
pub async fn send_chat_message(
    State(state): State<AssistantAppState>,
    RequireAuth(user): RequireAuth,
    body: Bytes,
) -> Result<Response, AssistantApiError> {
    let request: ChatRequestDto = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return Ok(response),
    };

    let outcome = state
        .chat
        .handle(SendChatMessageCommand {
            user_id: user.id,
            message: request.message,
            history: request.history,
        })
        .await?;

    Ok(Json(ChatResponse::from(outcome)).into_response())
}

/// POST /assistant/diagnose
pub async fn diagnose_photo(
    State(state): State<AssistantAppState>,
    RequireAuth(user): RequireAuth,
    body: Bytes,
) -> Result<Response, AssistantApiError> {
    let request: DiagnoseRequestDto = match parse_body(&body) {
        Ok(request) => request,
        Err(response) => return Ok(response),
    };
    let photo = match request.photo_source() {
        Ok(photo) => photo,
        Err(message) => return Ok(bad_request(message)),
    };

    let outcome = state
        .diagnose
        .handle(DiagnosePhotoCommand {
            user_id: user.id,
            photo,
            notes: request.notes,
        })
        .await?;

    Ok(Json(DiagnosisResponse::from(outcome)).into_response())
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct AssistantApiError(AdmissionError<AssistantError>);

impl From<AdmissionError<AssistantError>> for AssistantApiError {
    fn from(err: AdmissionError<AssistantError>) -> Self {
        Self(err)
    }
}

impl IntoResponse for AssistantApiError {
    fn into_response(self) -> Response {
        match self.0 {
            AdmissionError::LimitReached {
                action,
                current_count,
                limit,
            } => ErrorResponse::new(
                ErrorCode::UsageLimitReached,
                format!(
                    "You've used all {} free {} this month. Upgrade to Pro for unlimited use.",
                    limit,
                    action.label()
                ),
            )
            .with_details(json!({
                "action": action,
                "currentCount": current_count,
                "limit": limit,
            }))
            .into_response_with(StatusCode::PAYMENT_REQUIRED),

            AdmissionError::StoreUnavailable(err) => {
                tracing::error!(error = %err, "usage could not be verified");
                ErrorResponse::new(
                    ErrorCode::UsageUnavailable,
                    "Usage could not be verified, try again shortly",
                )
                .into_response_with(StatusCode::SERVICE_UNAVAILABLE)
            }

            AdmissionError::Action(AssistantError::InvalidRequest(message)) => bad_request(message),

            AdmissionError::Action(err) => {
                tracing::warn!(error = %err, retryable = err.is_retryable(), "assistant call failed");
                ErrorResponse::new(
                    ErrorCode::AssistantUnavailable,
                    "The assistant is unavailable right now. Your quota was not used.",
                )
                .into_response_with(StatusCode::BAD_GATEWAY)
            }
        }
    }
}
