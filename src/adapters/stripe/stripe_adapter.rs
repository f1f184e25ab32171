//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait against the Stripe REST API.
//! Requests are form-encoded and authenticated with the secret key as the
//! basic-auth user.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key);
//! let adapter = StripePaymentAdapter::new(config);
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::foundation::AccountId;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, LineItem,
    PaymentError, PaymentErrorCode, PaymentProvider, PortalSession,
};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base_url, path)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, PaymentError> {
        let response = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        Self::read_response(operation, response).await
    }

    async fn read_response<T: DeserializeOwned>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = map_api_error(status, &body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                error = %error,
                "Stripe request failed"
            );
            return Err(error);
        }

        response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let params = customer_params(&request);
        let customer: StripeCustomer = self
            .post_form("create_customer", "customers", &params)
            .await?;

        tracing::info!(
            account_id = %request.account_id,
            customer_id = %customer.id,
            "Stripe customer created"
        );

        Ok(Customer {
            id: customer.id,
            email: customer.email.or(request.email),
        })
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let params = checkout_params(&request);
        let session: StripeCheckoutSession = self
            .post_form("create_checkout_session", "checkout/sessions", &params)
            .await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::provider("Checkout session has no redirect URL"))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let params = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        let session: StripePortalSession = self
            .post_form("create_portal_session", "billing_portal/sessions", &params)
            .await?;

        Ok(PortalSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn create_connect_account(
        &self,
        account_id: &AccountId,
        email: Option<&str>,
    ) -> Result<String, PaymentError> {
        let mut params = vec![
            ("type".to_string(), "express".to_string()),
            ("metadata[account_id]".to_string(), account_id.to_string()),
            ("capabilities[transfers][requested]".to_string(), "true".to_string()),
        ];
        if let Some(email) = email {
            params.push(("email".to_string(), email.to_string()));
        }

        let account: StripeObject = self
            .post_form("create_connect_account", "accounts", &params)
            .await?;
        Ok(account.id)
    }

    async fn create_connect_onboarding_link(
        &self,
        connect_account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String, PaymentError> {
        let params = vec![
            ("account".to_string(), connect_account_id.to_string()),
            ("refresh_url".to_string(), refresh_url.to_string()),
            ("return_url".to_string(), return_url.to_string()),
            ("type".to_string(), "account_onboarding".to_string()),
        ];
        let link: StripeLink = self
            .post_form("create_connect_onboarding_link", "account_links", &params)
            .await?;
        Ok(link.url)
    }

    async fn create_connect_dashboard_link(
        &self,
        connect_account_id: &str,
    ) -> Result<String, PaymentError> {
        let path = format!("accounts/{}/login_links", connect_account_id);
        let link: StripeLink = self
            .post_form("create_connect_dashboard_link", &path, &[])
            .await?;
        Ok(link.url)
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), PaymentError> {
        let response = self
            .http_client
            .delete(self.url(&format!("subscriptions/{}", subscription_id)))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let _: StripeObject = Self::read_response("cancel_subscription", response).await?;
        tracing::info!(subscription_id, "Stripe subscription cancelled");
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Request Encoding
// ════════════════════════════════════════════════════════════════════════════

fn customer_params(request: &CreateCustomerRequest) -> Vec<(String, String)> {
    let mut params = vec![(
        "metadata[account_id]".to_string(),
        request.account_id.to_string(),
    )];
    if let Some(email) = &request.email {
        params.push(("email".to_string(), email.clone()));
    }
    params
}

/// Encodes a checkout request in Stripe's bracketed form syntax.
///
/// Subscription checkouts copy the metadata onto the subscription too, so
/// later `customer.subscription.*` events carry the account id.
fn checkout_params(request: &CreateCheckoutRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), request.mode.as_str().to_string()),
        ("customer".to_string(), request.customer_id.clone()),
        (
            "client_reference_id".to_string(),
            request.client_reference_id.clone(),
        ),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        match item {
            LineItem::Price { price_id, quantity } => {
                params.push((format!("line_items[{}][price]", i), price_id.clone()));
                params.push((format!("line_items[{}][quantity]", i), quantity.to_string()));
            }
            LineItem::AdHoc {
                name,
                unit_amount_cents,
                currency,
                quantity,
            } => {
                let prefix = format!("line_items[{}][price_data]", i);
                params.push((format!("{}[currency]", prefix), currency.clone()));
                params.push((
                    format!("{}[unit_amount]", prefix),
                    unit_amount_cents.to_string(),
                ));
                params.push((format!("{}[product_data][name]", prefix), name.clone()));
                params.push((format!("line_items[{}][quantity]", i), quantity.to_string()));
            }
        }
    }

    let mut keys: Vec<&String> = request.metadata.keys().collect();
    keys.sort();
    for key in keys {
        let value = request.metadata[key].clone();
        params.push((format!("metadata[{}]", key), value.clone()));
        if request.mode == crate::ports::CheckoutMode::Subscription {
            params.push((format!("subscription_data[metadata][{}]", key), value));
        }
    }

    params
}

// ════════════════════════════════════════════════════════════════════════════
// Response Decoding
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripePortalSession {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeLink {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    error: StripeErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn map_api_error(status: reqwest::StatusCode, body: &str) -> PaymentError {
    let detail = serde_json::from_str::<StripeErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_default();
    let message = detail
        .message
        .unwrap_or_else(|| format!("Stripe API error ({})", status.as_u16()));

    let code = match status.as_u16() {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        404 => PaymentErrorCode::NotFound,
        429 => PaymentErrorCode::RateLimitExceeded,
        400..=499 => PaymentErrorCode::InvalidRequest,
        _ => PaymentErrorCode::ProviderError,
    };

    let error = PaymentError::new(code, message);
    match detail.code {
        Some(provider_code) => error.with_provider_code(provider_code),
        None => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::CheckoutMode;
    use std::collections::HashMap;

    fn checkout_request(mode: CheckoutMode, line_items: Vec<LineItem>) -> CreateCheckoutRequest {
        let mut metadata = HashMap::new();
        metadata.insert("account_id".to_string(), "acc_1".to_string());
        metadata.insert("intent".to_string(), "subscribe".to_string());
        CreateCheckoutRequest {
            customer_id: "cus_1".to_string(),
            mode,
            line_items,
            metadata,
            client_reference_id: "acc_1".to_string(),
            success_url: "https://app.test/billing/success".to_string(),
            cancel_url: "https://app.test/billing/cancel".to_string(),
        }
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    // ══════════════════════════════════════════════════════════════
    // Configuration
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn config_new_sets_defaults() {
        let config = StripeConfig::new("sk_test_123");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert_eq!(config.api_key.expose_secret(), "sk_test_123");
    }

    #[test]
    fn config_with_base_url_trims_trailing_slash() {
        let config = StripeConfig::new("sk_test_123").with_base_url("http://localhost:12111/");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    #[test]
    fn config_with_owned_base_url_builds_versioned_paths() {
        let base = String::from("http://localhost:12111//");
        let adapter = StripePaymentAdapter::new(StripeConfig::new("sk_test_123").with_base_url(base));

        assert_eq!(adapter.url("customers"), "http://localhost:12111/v1/customers");
    }

    #[test]
    fn config_debug_redacts_key() {
        let debug = format!("{:?}", StripeConfig::new("sk_test_secret"));
        assert!(!debug.contains("sk_test_secret"));
        assert!(debug.contains("REDACTED"));
    }

    // ══════════════════════════════════════════════════════════════
    // Request Encoding
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn subscription_checkout_copies_metadata_to_subscription() {
        let request = checkout_request(
            CheckoutMode::Subscription,
            vec![LineItem::Price {
                price_id: "price_pro".to_string(),
                quantity: 1,
            }],
        );

        let params = checkout_params(&request);

        assert_eq!(param(&params, "mode"), Some("subscription"));
        assert_eq!(param(&params, "line_items[0][price]"), Some("price_pro"));
        assert_eq!(param(&params, "metadata[account_id]"), Some("acc_1"));
        assert_eq!(
            param(&params, "subscription_data[metadata][account_id]"),
            Some("acc_1")
        );
        assert_eq!(param(&params, "client_reference_id"), Some("acc_1"));
    }

    #[test]
    fn payment_checkout_uses_inline_price_data() {
        let request = checkout_request(
            CheckoutMode::Payment,
            vec![LineItem::AdHoc {
                name: "200 credits".to_string(),
                unit_amount_cents: 1500,
                currency: "usd".to_string(),
                quantity: 1,
            }],
        );

        let params = checkout_params(&request);

        assert_eq!(param(&params, "line_items[0][price_data][unit_amount]"), Some("1500"));
        assert_eq!(param(&params, "line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(
            param(&params, "line_items[0][price_data][product_data][name]"),
            Some("200 credits")
        );
        assert!(param(&params, "subscription_data[metadata][account_id]").is_none());
    }

    #[test]
    fn customer_params_include_account_metadata() {
        let params = customer_params(&CreateCustomerRequest {
            account_id: AccountId::new("acc_1").unwrap(),
            email: Some("a@example.com".to_string()),
        });

        assert_eq!(param(&params, "metadata[account_id]"), Some("acc_1"));
        assert_eq!(param(&params, "email"), Some("a@example.com"));
    }

    // ══════════════════════════════════════════════════════════════
    // Error Mapping
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn api_error_body_is_decoded() {
        let body = r#"{"error":{"type":"invalid_request_error","code":"resource_missing","message":"No such price"}}"#;

        let error = map_api_error(reqwest::StatusCode::BAD_REQUEST, body);

        assert_eq!(error.code, PaymentErrorCode::InvalidRequest);
        assert_eq!(error.message, "No such price");
        assert_eq!(error.provider_code.as_deref(), Some("resource_missing"));
        assert!(!error.retryable);
    }

    #[test]
    fn server_errors_are_retryable() {
        let error = map_api_error(reqwest::StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(error.code, PaymentErrorCode::ProviderError);
        assert!(error.retryable);
    }

    #[test]
    fn auth_and_rate_limit_statuses_map() {
        assert_eq!(
            map_api_error(reqwest::StatusCode::UNAUTHORIZED, "").code,
            PaymentErrorCode::AuthenticationError
        );
        assert_eq!(
            map_api_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "").code,
            PaymentErrorCode::RateLimitExceeded
        );
    }
}
