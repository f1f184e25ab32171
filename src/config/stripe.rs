//! Stripe configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::billing::{PriceCatalog, MAX_AMOUNT_CENTS};

/// Payment provider configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    /// Secret API key
    pub api_key: SecretString,

    /// Webhook endpoint signing secret
    pub webhook_secret: SecretString,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Reject test-mode events at the webhook endpoint
    #[serde(default)]
    pub require_livemode: bool,

    /// Recurring price for the Pro plan
    pub pro_price_id: String,

    /// Recurring price for the Teams plan
    pub teams_price_id: String,

    /// One-time fee for featuring a job post, in cents
    #[serde(default = "default_job_post_price_cents")]
    pub job_post_price_cents: u64,

    #[serde(default = "default_currency")]
    pub currency: String,

    pub success_url: String,
    pub cancel_url: String,
    pub portal_return_url: String,
    pub connect_refresh_url: String,
    pub connect_return_url: String,
}

impl StripeConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.api_key.expose_secret().starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.api_key.expose_secret().starts_with("sk_live_")
    }

    pub fn price_catalog(&self) -> PriceCatalog {
        PriceCatalog::new(self.pro_price_id.clone(), self.teams_price_id.clone())
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let api_key = self.api_key.expose_secret();
        let webhook_secret = self.webhook_secret.expose_secret();

        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE__API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE__WEBHOOK_SECRET"));
        }
        if !api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if self.require_livemode && self.is_test_mode() {
            return Err(ValidationError::LivemodeRequiresLiveKey);
        }

        if self.pro_price_id.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE__PRO_PRICE_ID"));
        }
        if self.teams_price_id.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE__TEAMS_PRICE_ID"));
        }
        if self.job_post_price_cents == 0 || self.job_post_price_cents > MAX_AMOUNT_CENTS {
            return Err(ValidationError::InvalidJobPostPrice);
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(ValidationError::InvalidCurrency);
        }

        for (name, url) in [
            ("STRIPE__SUCCESS_URL", &self.success_url),
            ("STRIPE__CANCEL_URL", &self.cancel_url),
            ("STRIPE__PORTAL_RETURN_URL", &self.portal_return_url),
            ("STRIPE__CONNECT_REFRESH_URL", &self.connect_refresh_url),
            ("STRIPE__CONNECT_RETURN_URL", &self.connect_return_url),
        ] {
            if url.is_empty() {
                return Err(ValidationError::MissingRequired(name));
            }
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(ValidationError::InvalidRedirectUrl(name));
            }
        }

        Ok(())
    }
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_job_post_price_cents() -> u64 {
    4900
}

fn default_currency() -> String {
    "usd".to_string()
}
