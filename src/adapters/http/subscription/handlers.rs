//! HTTP handlers for subscription endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::adapters::http::error::{bad_request, parse_body, ErrorResponse};
use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::{
    ApplyPlanTransitionCommand, ApplyPlanTransitionHandler, GetSubscriptionStatusHandler,
    GetSubscriptionStatusQuery, HandleBillingWebhookHandler, TransitionActor,
};
use crate::domain::foundation::{ErrorCode, UserId};
use crate::domain::subscription::{
    BillingInterval, Plan, PlanTransition, SubscriptionError, SubscriptionStatus, TargetState,
    WebhookError,
};
use crate::ports::SubscriptionStore;

use super::dto::{
    CancelRequest, SubscriptionRecordResponse, SubscriptionStatusResponse, TransitionRequest,
    WebhookAck,
};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Price ids of the billing provider, one per interval.
///
/// Self-service upgrades for an interval without a price id are refused
/// with 503, since checkout could never complete.
#[derive(Debug, Clone, Default)]
pub struct BillingSettings {
    pub monthly_price_id: Option<String>,
    pub yearly_price_id: Option<String>,
}

impl BillingSettings {
    pub fn price_id_for(&self, interval: BillingInterval) -> Option<&str> {
        match interval {
            BillingInterval::Month => self.monthly_price_id.as_deref(),
            BillingInterval::Year => self.yearly_price_id.as_deref(),
        }
        .filter(|id| !id.trim().is_empty())
    }
}

#[derive(Clone)]
pub struct SubscriptionAppState {
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub status: Arc<GetSubscriptionStatusHandler>,
    pub transitions: Arc<ApplyPlanTransitionHandler>,
    pub webhooks: Arc<HandleBillingWebhookHandler>,
    pub billing: BillingSettings,
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET /subscription/status
pub async fn get_status(
    State(state): State<SubscriptionAppState>,
    RequireAuth(user): RequireAuth,
) -> impl IntoResponse {
    let view = state
        .status
        .handle(GetSubscriptionStatusQuery { user_id: user.id })
        .await;
    Json(SubscriptionStatusResponse::from(view))
}

/// POST /subscription/transition
pub async fn transition(
    State(state): State<SubscriptionAppState>,
    RequireAuth(user): RequireAuth,
    body: Bytes,
) -> Result<Response, SubscriptionApiError> {
    let request: TransitionRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(_) => {
            return Ok(bad_request(
                "expected {\"interval\": \"month\"|\"year\"} or {\"userId\", \"plan\"}",
            ))
        }
    };

    let (user_id, transition) = match request {
        TransitionRequest::Upgrade { interval } => {
            let interval: BillingInterval = interval.parse().map_err(|_| {
                SubscriptionError::invalid_transition(format!("unknown interval '{}'", interval))
            })?;
            if state.billing.price_id_for(interval).is_none() {
                return Err(SubscriptionError::configuration_missing(format!(
                    "no price configured for the {} interval",
                    interval
                ))
                .into());
            }
            (
                user.id.clone(),
                PlanTransition::Billing(TargetState::start_trial(interval)),
            )
        }
        TransitionRequest::Override { user_id, plan } => {
            if !user.is_admin() {
                return Err(
                    SubscriptionError::forbidden("plan overrides require the admin role").into(),
                );
            }
            let target = UserId::new(user_id)
                .map_err(|e| SubscriptionError::invalid_transition(e.to_string()))?;
            let plan: Plan = plan.parse().map_err(|_| {
                SubscriptionError::invalid_transition(format!("unknown plan '{}'", plan))
            })?;
            (target, PlanTransition::AdminOverride { plan })
        }
    };

    let outcome = state
        .transitions
        .handle(ApplyPlanTransitionCommand {
            user_id,
            transition,
            actor: TransitionActor::User(user),
        })
        .await?;

    let changed = outcome.is_changed();
    Ok(Json(SubscriptionRecordResponse::new(outcome.into_record(), changed)).into_response())
}

/// POST /subscription/cancel
pub async fn cancel(
    State(state): State<SubscriptionAppState>,
    RequireAuth(user): RequireAuth,
    body: Bytes,
) -> Result<Response, SubscriptionApiError> {
    let request: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        match parse_body(&body) {
            Ok(request) => request,
            Err(response) => return Ok(response),
        }
    };

    let current = state
        .subscriptions
        .get_subscription(&user.id)
        .await?
        .filter(|r| r.plan == Plan::Pro && r.status != SubscriptionStatus::Canceled)
        .ok_or_else(|| SubscriptionError::invalid_transition("no active subscription to cancel"))?;

    let target = if request.at_period_end {
        TargetState::schedule_cancellation(&current)
    } else {
        TargetState::cancel_immediately()
    };

    let outcome = state
        .transitions
        .handle(ApplyPlanTransitionCommand {
            user_id: user.id.clone(),
            transition: PlanTransition::Billing(target),
            actor: TransitionActor::User(user),
        })
        .await?;

    let changed = outcome.is_changed();
    Ok(Json(SubscriptionRecordResponse::new(outcome.into_record(), changed)).into_response())
}

/// POST /webhooks/billing
pub async fn billing_webhook(
    State(state): State<SubscriptionAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingField("Stripe-Signature header"))?;

    let outcome = state.webhooks.handle(&body, signature).await?;
    Ok(Json(WebhookAck::from(outcome)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct SubscriptionApiError(SubscriptionError);

impl From<SubscriptionError> for SubscriptionApiError {
    fn from(err: SubscriptionError) -> Self {
        Self(err)
    }
}

impl From<crate::ports::StoreError> for SubscriptionApiError {
    fn from(err: crate::ports::StoreError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for SubscriptionApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SubscriptionError::Unauthorized => StatusCode::UNAUTHORIZED,
            SubscriptionError::Forbidden(_) => StatusCode::FORBIDDEN,
            SubscriptionError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            SubscriptionError::ConfigurationMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
            SubscriptionError::StoreUnavailable(reason) => {
                tracing::error!(reason = %reason, "subscription store unavailable");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        ErrorResponse::new(self.0.code(), self.0.message()).into_response_with(status)
    }
}

#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            WebhookError::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::ConfigurationMissing,
                "Billing webhooks are not configured".to_string(),
            ),
            WebhookError::StoreUnavailable(reason) => {
                tracing::error!(reason = %reason, "webhook could not be applied");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCode::StoreUnavailable,
                    "Temporarily unavailable, retry later".to_string(),
                )
            }
            other => (StatusCode::BAD_REQUEST, ErrorCode::WebhookRejected, other.to_string()),
        };
        ErrorResponse::new(code, message).into_response_with(status)
    }
}
