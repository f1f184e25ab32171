//! HTTP DTOs for billing endpoints.
//!
//! Request and response bodies use camelCase; error bodies keep the
//! `error_code`/`message` shape shared by every endpoint.

use serde::{Deserialize, Serialize};

use crate::domain::billing::Account;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a checkout session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckoutRequest {
    /// What to buy: `pro`, `teams`, `credits_50`, `credits_200`,
    /// `credits_500`, `invoice` or `job_post`.
    pub intent_key: String,
    /// Account the purchase is for; must be the caller's own.
    pub account_id: String,
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<u64>,
    #[serde(default)]
    pub job_post_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeCreditsRequest {
    pub credits: u64,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Redirect target for checkout, portal and connect flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlResponse {
    pub url: String,
}

/// Acknowledgement returned to the payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

/// Billing state of one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub account_id: String,
    pub plan_tier: String,
    pub credit_balance: u64,
    pub subscription_id: Option<String>,
    /// End of the current subscription period (RFC 3339).
    pub subscription_period_end: Option<String>,
    pub customer_linked: bool,
    pub payouts_linked: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.id.to_string(),
            plan_tier: account.plan_tier.as_str().to_string(),
            credit_balance: account.credit_balance,
            subscription_id: account.subscription_id,
            subscription_period_end: account
                .subscription_period_end
                .map(|t| t.as_datetime().to_rfc3339()),
            customer_linked: account.customer_id.is_some(),
            payouts_linked: account.connect_account_id.is_some(),
            created_at: account.created_at.as_datetime().to_rfc3339(),
            updated_at: account.updated_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Standard error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{AccountId, Timestamp};

    #[test]
    fn checkout_request_reads_camel_case() {
        let request: StartCheckoutRequest = serde_json::from_str(
            r#"{"intentKey":"invoice","accountId":"acc_1","invoiceId":"inv_1","amountCents":1200}"#,
        )
        .unwrap();

        assert_eq!(request.intent_key, "invoice");
        assert_eq!(request.invoice_id.as_deref(), Some("inv_1"));
        assert_eq!(request.amount_cents, Some(1200));
        assert!(request.job_post_id.is_none());
    }

    #[test]
    fn account_response_hides_provider_ids() {
        let mut account = Account::register(AccountId::new("acc_1").unwrap(), Timestamp::now());
        account.customer_id = Some("cus_secret".to_string());

        let json = serde_json::to_value(AccountResponse::from(account)).unwrap();

        assert_eq!(json["accountId"], "acc_1");
        assert_eq!(json["planTier"], "free");
        assert_eq!(json["customerLinked"], true);
        assert!(!json.to_string().contains("cus_secret"));
    }

    #[test]
    fn error_response_uses_snake_case_code() {
        let json = serde_json::to_value(ErrorResponse::new("VALIDATION_FAILED", "bad")).unwrap();
        assert_eq!(json["error_code"], "VALIDATION_FAILED");
        assert_eq!(json["message"], "bad");
    }
}
