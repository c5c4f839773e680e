//! Billing provider configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use crate::adapters::http::subscription::BillingSettings;
use crate::domain::subscription::WebhookVerifier;

use super::error::ValidationError;

/// Stripe-format billing settings.
///
/// Every field is optional: without a webhook secret the webhook endpoint
/// answers 503, and without a price id self-service upgrades for that
/// interval answer 503.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    pub webhook_secret: Option<Secret<String>>,
    pub monthly_price_id: Option<String>,
    pub yearly_price_id: Option<String>,
}

impl PaymentConfig {
    pub fn webhook_verifier(&self) -> Option<WebhookVerifier> {
        self.webhook_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .filter(|s| !s.is_empty())
            .map(WebhookVerifier::new)
    }

    pub fn billing_settings(&self) -> BillingSettings {
        BillingSettings {
            monthly_price_id: self.monthly_price_id.clone(),
            yearly_price_id: self.yearly_price_id.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(secret) = &self.webhook_secret {
            let secret = secret.expose_secret();
            if !secret.is_empty() && !secret.starts_with("whsec_") {
                return Err(ValidationError::InvalidWebhookSecret);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::BillingInterval;

    #[test]
    fn unconfigured_payment_is_valid_but_inert() {
        let config = PaymentConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.webhook_verifier().is_none());
        assert!(config.billing_settings().price_id_for(BillingInterval::Month).is_none());
    }

    #[test]
    fn webhook_secret_needs_stripe_prefix() {
        let config = PaymentConfig {
            webhook_secret: Some(Secret::new("plain".to_string())),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidWebhookSecret));
    }

    #[test]
    fn configured_secret_yields_verifier() {
        let config = PaymentConfig {
            webhook_secret: Some(Secret::new("whsec_test".to_string())),
            yearly_price_id: Some("price_year".to_string()),
            ..Default::default()
        };
        assert!(config.webhook_verifier().is_some());
        assert_eq!(
            config.billing_settings().price_id_for(BillingInterval::Year),
            Some("price_year")
        );
    }
}
