//! Top-level API router.

use axum::{middleware::from_fn_with_state, routing::get, Router};

use super::assistant::{assistant_routes, AssistantAppState};
use super::middleware::{auth_middleware, AuthState};
use super::subscription::{subscription_routes, webhook_routes, SubscriptionAppState};

/// Builds the full API.
///
/// ```text
/// GET  /health
/// /subscription/*   bearer auth
/// /assistant/*      bearer auth
/// POST /webhooks/billing   signature verified, no bearer auth
/// ```
pub fn api_router(
    auth: AuthState,
    subscriptions: SubscriptionAppState,
    assistant: AssistantAppState,
) -> Router {
    let authed: Router = Router::new()
        .nest("/subscription", subscription_routes().with_state(subscriptions.clone()))
        .nest("/assistant", assistant_routes().with_state(assistant))
        .layer(from_fn_with_state(auth, auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(authed)
        .nest("/webhooks", webhook_routes().with_state(subscriptions))
}

async fn health() -> &'static str {
    "ok"
}
