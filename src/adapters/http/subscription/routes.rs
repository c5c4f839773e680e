//! Router configuration for subscription endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{billing_webhook, cancel, get_status, transition, SubscriptionAppState};

/// Authenticated routes, mounted under `/subscription`.
///
/// - `GET /status`
/// - `POST /transition`
/// - `POST /cancel`
pub fn subscription_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/transition", post(transition))
        .route("/cancel", post(cancel))
}

/// Signature-verified routes, mounted under `/webhooks`. No bearer auth.
pub fn webhook_routes() -> Router<SubscriptionAppState> {
    Router::new().route("/billing", post(billing_webhook))
}
