//! Billing provider webhook events and their meaning for subscriptions.
//!
//! Only the fields the subscription lifecycle needs are captured; the rest of
//! the provider's schema is ignored. [`interpret`] maps an event onto a
//! billing-kind [`TargetState`] without touching any store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::{Timestamp, UserId};

use super::transition::TargetState;
use super::webhook_errors::WebhookError;
use super::{BillingInterval, BillingRefs, SubscriptionStatus};

/// Envelope of a billing webhook.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingEvent {
    /// Unique event id (`evt_...`).
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix seconds.
    pub created: i64,

    pub data: BillingEventData,

    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingEventData {
    pub object: serde_json::Value,
}

/// Event types that change a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingEventKind {
    CheckoutCompleted,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaid,
    InvoicePaymentFailed,
    Other,
}

impl BillingEventKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutCompleted,
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "invoice.paid" | "invoice.payment_succeeded" => Self::InvoicePaid,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            _ => Self::Other,
        }
    }
}

impl BillingEvent {
    pub fn kind(&self) -> BillingEventKind {
        BillingEventKind::parse(&self.event_type)
    }

    fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, WebhookError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| WebhookError::ParseError(format!("{}: {}", self.event_type, e)))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Provider objects
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    client_reference_id: Option<String>,
    customer: Option<String>,
    subscription: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ProviderSubscription {
    id: String,
    customer: Option<String>,
    status: String,
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
    #[serde(default)]
    metadata: HashMap<String, String>,
    items: Option<ItemList>,
}

#[derive(Debug, Deserialize)]
struct ItemList {
    #[serde(default)]
    data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: Option<Price>,
}

#[derive(Debug, Deserialize)]
struct Price {
    recurring: Option<Recurring>,
}

#[derive(Debug, Deserialize)]
struct Recurring {
    interval: String,
}

#[derive(Debug, Deserialize)]
struct Invoice {
    subscription: Option<String>,
    customer: Option<String>,
    lines: Option<InvoiceLines>,
}

#[derive(Debug, Deserialize)]
struct InvoiceLines {
    #[serde(default)]
    data: Vec<InvoiceLine>,
}

#[derive(Debug, Deserialize)]
struct InvoiceLine {
    period: Option<LinePeriod>,
}

#[derive(Debug, Deserialize)]
struct LinePeriod {
    end: i64,
}

impl ProviderSubscription {
    fn interval(&self) -> Option<BillingInterval> {
        self.items
            .as_ref()?
            .data
            .iter()
            .filter_map(|item| item.price.as_ref()?.recurring.as_ref())
            .find_map(|r| r.interval.parse().ok())
    }

    fn refs(&self) -> BillingRefs {
        BillingRefs {
            customer_id: self.customer.clone(),
            subscription_id: Some(self.id.clone()),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Interpretation
// ════════════════════════════════════════════════════════════════════════════════

/// How the event identifies the subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberRef {
    User(UserId),
    /// Only the provider's subscription id is known; resolve via the store.
    ProviderSubscription(String),
}

/// What a webhook asks the transition handler to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookInstruction {
    Apply {
        subscriber: SubscriberRef,
        target: TargetState,
    },
    Ignore {
        reason: String,
    },
}

/// Maps the provider's subscription status onto ours.
///
/// `incomplete` (first payment still pending) and `paused` carry no
/// lifecycle meaning here and yield `None`.
pub fn map_provider_status(status: &str) -> Option<SubscriptionStatus> {
    match status {
        "trialing" => Some(SubscriptionStatus::Trialing),
        "active" => Some(SubscriptionStatus::Active),
        "past_due" | "unpaid" => Some(SubscriptionStatus::PastDue),
        "canceled" | "incomplete_expired" => Some(SubscriptionStatus::Canceled),
        _ => None,
    }
}

/// Translates a verified event into a webhook instruction.
pub fn interpret(event: &BillingEvent) -> Result<WebhookInstruction, WebhookError> {
    match event.kind() {
        BillingEventKind::CheckoutCompleted => {
            let session: CheckoutSession = event.object()?;
            let user = session
                .client_reference_id
                .clone()
                .or_else(|| session.metadata.get("user_id").cloned())
                .ok_or(WebhookError::MissingField("client_reference_id"))?;
            let interval = session
                .metadata
                .get("interval")
                .ok_or(WebhookError::MissingField("metadata.interval"))?
                .parse::<BillingInterval>()
                .map_err(|e| WebhookError::ParseError(e.to_string()))?;

            Ok(WebhookInstruction::Apply {
                subscriber: SubscriberRef::User(parse_user(&user)?),
                target: TargetState::start_trial(interval).with_billing_refs(BillingRefs {
                    customer_id: session.customer,
                    subscription_id: session.subscription,
                }),
            })
        }

        BillingEventKind::SubscriptionCreated | BillingEventKind::SubscriptionUpdated => {
            let sub: ProviderSubscription = event.object()?;
            let Some(status) = map_provider_status(&sub.status) else {
                return Ok(WebhookInstruction::Ignore {
                    reason: format!("provider status '{}' has no lifecycle meaning", sub.status),
                });
            };

            let mut target = TargetState::synced(status, sub.interval())
                .with_cancel_at_period_end(sub.cancel_at_period_end)
                .with_billing_refs(sub.refs());
            if let Some(end) = sub.current_period_end.and_then(Timestamp::from_unix_secs) {
                target = target.with_period_end(end);
            }

            Ok(WebhookInstruction::Apply {
                subscriber: subscriber_of(&sub)?,
                target,
            })
        }

        BillingEventKind::SubscriptionDeleted => {
            let sub: ProviderSubscription = event.object()?;
            Ok(WebhookInstruction::Apply {
                subscriber: subscriber_of(&sub)?,
                target: TargetState::cancel_immediately().with_billing_refs(sub.refs()),
            })
        }

        BillingEventKind::InvoicePaid => {
            let invoice: Invoice = event.object()?;
            let subscription = invoice
                .subscription
                .clone()
                .ok_or(WebhookError::MissingField("subscription"))?;
            let period_end = invoice
                .lines
                .as_ref()
                .and_then(|lines| {
                    lines
                        .data
                        .iter()
                        .filter_map(|l| l.period.as_ref())
                        .map(|p| p.end)
                        .max()
                })
                .and_then(Timestamp::from_unix_secs);

            let mut target = TargetState::activate(None).with_billing_refs(BillingRefs {
                customer_id: invoice.customer,
                subscription_id: Some(subscription.clone()),
            });
            if let Some(end) = period_end {
                target = target.with_period_end(end);
            }

            Ok(WebhookInstruction::Apply {
                subscriber: SubscriberRef::ProviderSubscription(subscription),
                target,
            })
        }

        BillingEventKind::InvoicePaymentFailed => {
            let invoice: Invoice = event.object()?;
            let subscription = invoice
                .subscription
                .ok_or(WebhookError::MissingField("subscription"))?;
            Ok(WebhookInstruction::Apply {
                subscriber: SubscriberRef::ProviderSubscription(subscription),
                target: TargetState::mark_past_due(),
            })
        }

        BillingEventKind::Other => Ok(WebhookInstruction::Ignore {
            reason: format!("event type '{}' not handled", event.event_type),
        }),
    }
}

fn subscriber_of(sub: &ProviderSubscription) -> Result<SubscriberRef, WebhookError> {
    match sub.metadata.get("user_id") {
        Some(user) => Ok(SubscriberRef::User(parse_user(user)?)),
        None => Ok(SubscriberRef::ProviderSubscription(sub.id.clone())),
    }
}

fn parse_user(raw: &str) -> Result<UserId, WebhookError> {
    UserId::new(raw).map_err(|e| WebhookError::ParseError(e.to_string()))
}
