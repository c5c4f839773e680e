//! Router configuration for assistant endpoints.

use axum::{routing::post, Router};

use super::handlers::{diagnose_photo, send_chat_message, AssistantAppState};

/// Mounted under `/assistant`.
pub fn assistant_routes() -> Router<AssistantAppState> {
    Router::new()
        .route("/chat", post(send_chat_message))
        .route("/diagnose", post(diagnose_photo))
}
