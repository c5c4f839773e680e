//! Integration tests for the subscription endpoints and the billing webhook.
//!
//! Every test drives the real router over in-memory adapters with a fixed
//! clock, so dates in responses are exact.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestApp, TestAppBuilder, ADMIN_TOKEN, FREE_TOKEN, FREE_USER, OTHER_TOKEN};

// =============================================================================
// Health and auth
// =============================================================================

#[tokio::test]
async fn health_needs_no_token() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));
}

#[tokio::test]
async fn status_requires_authentication() {
    let app = TestApp::new();

    let (status, body) = app.get("/subscription/status", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.get("/subscription/status", Some("bogus-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Status
// =============================================================================

#[tokio::test]
async fn new_user_reads_free_plan_without_creating_rows() {
    let app = TestApp::new();

    let (status, body) = app.get("/subscription/status", Some(FREE_TOKEN)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], "free");
    assert_eq!(body["status"], "active");
    assert_eq!(body["effectivePlan"], "free");
    assert_eq!(body["usage"]["aiChatCount"], 0);
    assert_eq!(body["usage"]["photoDiagnosisCount"], 0);
    assert_eq!(body["usage"]["periodStart"], "2025-06-01");
    assert_eq!(body["limits"], json!({"aiChat": 3, "photoDiagnosis": 2}));
    assert!(body.get("billingInterval").is_none());
    assert_eq!(body["degraded"], false);

    assert_eq!(app.usage.row_count().await, 0);
    assert!(app.subscriptions.is_empty().await);
}

#[tokio::test]
async fn status_degrades_to_free_when_stores_are_down() {
    let app = TestApp::new();
    app.post("/subscription/transition", Some(FREE_TOKEN), json!({"interval": "month"}))
        .await;
    app.subscriptions.set_unavailable(true);
    app.usage.set_unavailable(true);

    let (status, body) = app.get("/subscription/status", Some(FREE_TOKEN)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], "free");
    assert_eq!(body["effectivePlan"], "free");
    assert_eq!(body["usage"]["aiChatCount"], 0);
    assert_eq!(body["degraded"], true);
}

// =============================================================================
// Self-service upgrade
// =============================================================================

#[tokio::test]
async fn monthly_upgrade_starts_seven_day_trial() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/subscription/transition", Some(FREE_TOKEN), json!({"interval": "month"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], FREE_USER);
    assert_eq!(body["plan"], "pro");
    assert_eq!(body["status"], "trialing");
    assert_eq!(body["billingInterval"], "month");
    assert_eq!(body["trialEnd"], "2025-06-12T12:00:00Z");
    assert_eq!(body["currentPeriodEnd"], "2025-07-05T12:00:00Z");
    assert_eq!(body["changed"], true);

    let (_, status_body) = app.get("/subscription/status", Some(FREE_TOKEN)).await;
    assert_eq!(status_body["effectivePlan"], "pro");
    assert_eq!(status_body["limits"], json!({"aiChat": null, "photoDiagnosis": null}));
}

#[tokio::test]
async fn repeated_upgrade_keeps_original_dates() {
    let app = TestApp::new();
    app.post("/subscription/transition", Some(FREE_TOKEN), json!({"interval": "month"}))
        .await;
    app.clock.advance_days(2);

    let (status, body) = app
        .post("/subscription/transition", Some(FREE_TOKEN), json!({"interval": "month"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);
    assert_eq!(body["trialEnd"], "2025-06-12T12:00:00Z");
    assert_eq!(body["currentPeriodEnd"], "2025-07-05T12:00:00Z");
}

#[tokio::test]
async fn upgrade_without_price_id_is_unavailable() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/subscription/transition", Some(FREE_TOKEN), json!({"interval": "year"}))
        .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "CONFIGURATION_MISSING");
    assert!(app.subscriptions.is_empty().await);
}

#[tokio::test]
async fn yearly_upgrade_works_when_priced() {
    let app = TestAppBuilder::new().with_yearly_price().build();

    let (status, body) = app
        .post("/subscription/transition", Some(FREE_TOKEN), json!({"interval": "year"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["billingInterval"], "year");
    assert_eq!(body["currentPeriodEnd"], "2026-06-05T12:00:00Z");
}

#[tokio::test]
async fn malformed_transition_bodies_are_rejected() {
    let app = TestApp::new();

    for body in [json!({"interval": "fortnight"}), json!({"tier": "gold"})] {
        let (status, response) = app
            .post("/subscription/transition", Some(FREE_TOKEN), body)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response["code"].is_string());
    }

    let (status, _) = app
        .post_raw("/subscription/transition", Some(FREE_TOKEN), "{not json")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Admin override
// =============================================================================

#[tokio::test]
async fn override_requires_admin_role() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/subscription/transition",
            Some(OTHER_TOKEN),
            json!({"userId": FREE_USER, "plan": "pro"}),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert!(app.subscriptions.is_empty().await);
}

#[tokio::test]
async fn admin_can_grant_and_revoke_pro() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/subscription/transition",
            Some(ADMIN_TOKEN),
            json!({"userId": FREE_USER, "plan": "pro"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], "pro");
    assert_eq!(body["status"], "active");
    assert_eq!(body["billingInterval"], "month");
    assert!(body["trialEnd"].is_null());

    let (status, body) = app
        .post(
            "/subscription/transition",
            Some(ADMIN_TOKEN),
            json!({"userId": FREE_USER, "plan": "free"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], "free");
    assert!(body["billingInterval"].is_null());
    assert!(body["currentPeriodEnd"].is_null());
}

#[tokio::test]
async fn override_with_unknown_plan_is_bad_request() {
    let app = TestApp::new();

    let (status, _) = app
        .post(
            "/subscription/transition",
            Some(ADMIN_TOKEN),
            json!({"userId": FREE_USER, "plan": "platinum"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn cancel_without_subscription_is_bad_request() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/subscription/cancel", Some(FREE_TOKEN), json!({}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn scheduled_cancellation_keeps_status_and_dates() {
    let app = TestApp::new();
    app.post("/subscription/transition", Some(FREE_TOKEN), json!({"interval": "month"}))
        .await;

    let (status, body) = app
        .post("/subscription/cancel", Some(FREE_TOKEN), json!({"atPeriodEnd": true}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "trialing");
    assert_eq!(body["cancelAtPeriodEnd"], true);
    assert_eq!(body["currentPeriodEnd"], "2025-07-05T12:00:00Z");
}

#[tokio::test]
async fn immediate_cancellation_ends_entitlement() {
    let app = TestApp::new();
    app.post("/subscription/transition", Some(FREE_TOKEN), json!({"interval": "month"}))
        .await;

    let (status, body) = app
        .post("/subscription/cancel", Some(FREE_TOKEN), json!({"atPeriodEnd": false}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "canceled");

    let (_, status_body) = app.get("/subscription/status", Some(FREE_TOKEN)).await;
    assert_eq!(status_body["effectivePlan"], "free");

    let (status, _) = app
        .post("/subscription/cancel", Some(FREE_TOKEN), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Billing webhook
// =============================================================================

fn checkout_completed(event_id: &str) -> String {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": 1749124800,
        "data": {"object": {
            "client_reference_id": FREE_USER,
            "customer": "cus_123",
            "subscription": "sub_123",
            "metadata": {"interval": "month"}
        }}
    })
    .to_string()
}

fn invoice_event(event_type: &str, subscription: &str) -> String {
    json!({
        "id": format!("evt_{}", event_type),
        "type": event_type,
        "created": 1749124800,
        "data": {"object": {"subscription": subscription, "customer": "cus_123"}}
    })
    .to_string()
}

#[tokio::test]
async fn webhook_requires_signature_header() {
    let app = TestApp::new();

    let (status, body) = app.post_webhook(&checkout_completed("evt_1"), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "WEBHOOK_REJECTED");
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let app = TestApp::new();
    let payload = checkout_completed("evt_1");
    let signature = app.sign("{\"tampered\":true}");

    let (status, _) = app.post_webhook(&payload, Some(&signature)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.subscriptions.is_empty().await);
}

#[tokio::test]
async fn webhook_without_secret_is_unavailable() {
    let app = TestAppBuilder::new().without_webhook_secret().build();
    let payload = checkout_completed("evt_1");
    let signature = app.sign(&payload);

    let (status, body) = app.post_webhook(&payload, Some(&signature)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "CONFIGURATION_MISSING");
}

#[tokio::test]
async fn checkout_webhook_starts_trial_and_redelivery_is_duplicate() {
    let app = TestApp::new();
    let payload = checkout_completed("evt_1");
    let signature = app.sign(&payload);

    let (status, body) = app.post_webhook(&payload, Some(&signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");

    let (_, status_body) = app.get("/subscription/status", Some(FREE_TOKEN)).await;
    assert_eq!(status_body["status"], "trialing");
    assert_eq!(status_body["trialEnd"], "2025-06-12T12:00:00Z");

    app.clock.advance_days(1);
    let signature = app.sign(&payload);
    let (status, body) = app.post_webhook(&payload, Some(&signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "duplicate");

    let (_, status_body) = app.get("/subscription/status", Some(FREE_TOKEN)).await;
    assert_eq!(status_body["trialEnd"], "2025-06-12T12:00:00Z");
}

#[tokio::test]
async fn payment_failure_resolves_user_by_subscription_id() {
    let app = TestApp::new();
    let checkout = checkout_completed("evt_1");
    app.post_webhook(&checkout, Some(&app.sign(&checkout))).await;

    // Trialing cannot go straight to past_due; activate first.
    let paid = invoice_event("invoice.paid", "sub_123");
    let (status, body) = app.post_webhook(&paid, Some(&app.sign(&paid))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");

    let failed = invoice_event("invoice.payment_failed", "sub_123");
    let (status, body) = app.post_webhook(&failed, Some(&app.sign(&failed))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");

    let (_, status_body) = app.get("/subscription/status", Some(FREE_TOKEN)).await;
    assert_eq!(status_body["status"], "past_due");
    assert_eq!(status_body["effectivePlan"], "free");
}

#[tokio::test]
async fn scheduled_cancellation_survives_failed_and_recovered_payment() {
    let app = TestApp::new();
    let checkout = checkout_completed("evt_1");
    app.post_webhook(&checkout, Some(&app.sign(&checkout))).await;
    let paid = invoice_event("invoice.paid", "sub_123");
    app.post_webhook(&paid, Some(&app.sign(&paid))).await;

    let (status, _) = app
        .post("/subscription/cancel", Some(FREE_TOKEN), json!({"atPeriodEnd": true}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let failed = invoice_event("invoice.payment_failed", "sub_123");
    let (_, body) = app.post_webhook(&failed, Some(&app.sign(&failed))).await;
    assert_eq!(body["outcome"], "applied");
    let (_, status_body) = app.get("/subscription/status", Some(FREE_TOKEN)).await;
    assert_eq!(status_body["status"], "past_due");
    assert_eq!(status_body["cancelAtPeriodEnd"], true);

    let (_, body) = app.post_webhook(&paid, Some(&app.sign(&paid))).await;
    assert_eq!(body["outcome"], "applied");
    let (_, status_body) = app.get("/subscription/status", Some(FREE_TOKEN)).await;
    assert_eq!(status_body["status"], "active");
    assert_eq!(status_body["cancelAtPeriodEnd"], true);
}

#[tokio::test]
async fn unreachable_transition_is_acknowledged_as_ignored() {
    let app = TestApp::new();
    let checkout = checkout_completed("evt_1");
    app.post_webhook(&checkout, Some(&app.sign(&checkout))).await;

    let failed = invoice_event("invoice.payment_failed", "sub_123");
    let (status, body) = app.post_webhook(&failed, Some(&app.sign(&failed))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
    let (_, status_body) = app.get("/subscription/status", Some(FREE_TOKEN)).await;
    assert_eq!(status_body["status"], "trialing");
}

#[tokio::test]
async fn unknown_subscription_is_rejected_for_retry() {
    let app = TestApp::new();
    let failed = invoice_event("invoice.payment_failed", "sub_unknown");

    let (status, body) = app.post_webhook(&failed, Some(&app.sign(&failed))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "WEBHOOK_REJECTED");
}

#[tokio::test]
async fn webhook_store_outage_asks_provider_to_retry() {
    let app = TestApp::new();
    app.subscriptions.set_unavailable(true);
    let payload = checkout_completed("evt_1");

    let (status, _) = app.post_webhook(&payload, Some(&app.sign(&payload))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unrelated_event_types_are_ignored() {
    let app = TestApp::new();
    let payload = json!({
        "id": "evt_misc",
        "type": "customer.created",
        "created": 1749124800,
        "data": {"object": {}}
    })
    .to_string();

    let (status, body) = app.post_webhook(&payload, Some(&app.sign(&payload))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
}
