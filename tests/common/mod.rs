//! Shared harness: the full router over in-memory adapters.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use greenkeep::adapters::ai::MockAssistantProvider;
use greenkeep::adapters::auth::MockSessionValidator;
use greenkeep::adapters::http::BillingSettings;
use greenkeep::adapters::memory::{InMemorySubscriptionStore, InMemoryUsageStore};
use greenkeep::adapters::FixedClock;
use greenkeep::domain::foundation::Timestamp;
use greenkeep::domain::subscription::WebhookVerifier;
use greenkeep::domain::usage::FreeTierLimits;
use greenkeep::{build_router, AppDependencies};

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const NOW: &str = "2025-06-05T12:00:00Z";

pub const FREE_TOKEN: &str = "token-free";
pub const FREE_USER: &str = "user-free";
pub const OTHER_TOKEN: &str = "token-other";
pub const OTHER_USER: &str = "user-other";
pub const ADMIN_TOKEN: &str = "token-admin";

pub fn ts(rfc3339: &str) -> Timestamp {
    Timestamp::from_datetime(
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc),
    )
}

pub struct TestApp {
    pub router: Router,
    pub subscriptions: Arc<InMemorySubscriptionStore>,
    pub usage: Arc<InMemoryUsageStore>,
    pub clock: FixedClock,
    pub assistant: MockAssistantProvider,
}

pub struct TestAppBuilder {
    limits: FreeTierLimits,
    webhooks: bool,
    yearly_price: bool,
    assistant: MockAssistantProvider,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            limits: FreeTierLimits::new(3, 2),
            webhooks: true,
            yearly_price: false,
            assistant: MockAssistantProvider::new(),
        }
    }

    pub fn limits(mut self, ai_chat: u32, photo_diagnosis: u32) -> Self {
        self.limits = FreeTierLimits::new(ai_chat, photo_diagnosis);
        self
    }

    pub fn without_webhook_secret(mut self) -> Self {
        self.webhooks = false;
        self
    }

    pub fn with_yearly_price(mut self) -> Self {
        self.yearly_price = true;
        self
    }

    pub fn assistant(mut self, assistant: MockAssistantProvider) -> Self {
        self.assistant = assistant;
        self
    }

    pub fn build(self) -> TestApp {
        let subscriptions = Arc::new(InMemorySubscriptionStore::new());
        let usage = Arc::new(InMemoryUsageStore::new());
        let clock = FixedClock::new(ts(NOW));
        let sessions = MockSessionValidator::new()
            .with_test_user(FREE_TOKEN, FREE_USER)
            .with_test_user(OTHER_TOKEN, OTHER_USER)
            .with_admin(ADMIN_TOKEN, "ops-admin");

        let router = build_router(AppDependencies {
            subscriptions: subscriptions.clone(),
            usage: usage.clone(),
            clock: Arc::new(clock.clone()),
            assistant: Arc::new(self.assistant.clone()),
            sessions: Arc::new(sessions),
            limits: self.limits,
            webhook_verifier: self.webhooks.then(|| WebhookVerifier::new(WEBHOOK_SECRET)),
            billing: BillingSettings {
                monthly_price_id: Some("price_monthly".to_string()),
                yearly_price_id: self.yearly_price.then(|| "price_yearly".to_string()),
            },
        });

        TestApp {
            router,
            subscriptions,
            usage,
            clock,
            assistant: self.assistant,
        }
    }
}

impl TestApp {
    pub fn new() -> Self {
        TestAppBuilder::new().build()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, token, Some(body.to_string())).await
    }

    pub async fn post_raw(
        &self,
        uri: &str,
        token: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        self.send("POST", uri, token, Some(body.to_string())).await
    }

    pub async fn post_webhook(
        &self,
        payload: &str,
        signature: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/webhooks/billing")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header("Stripe-Signature", signature);
        }
        let request = request.body(Body::from(payload.to_string())).unwrap();
        read(self.router.clone().oneshot(request).await.unwrap()).await
    }

    /// Signs `payload` as of the app clock's current time.
    pub fn sign(&self, payload: &str) -> String {
        use greenkeep::ports::Clock;
        greenkeep::domain::subscription::sign_for_tests(
            WEBHOOK_SECRET,
            self.clock.now().as_unix_secs(),
            payload,
        )
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body)),
            None => request.body(Body::empty()),
        }
        .unwrap();

        read(self.router.clone().oneshot(request).await.unwrap()).await
    }
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}
