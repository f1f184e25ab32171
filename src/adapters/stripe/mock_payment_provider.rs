//! Mock payment provider for testing.
//!
//! Provides a configurable mock implementation of `PaymentProvider` for unit
//! and integration tests. Supports:
//! - Pre-configured responses
//! - Error injection
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::foundation::AccountId;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
    PaymentProvider, PortalSession,
};

/// Mock payment provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
///
/// // Inject errors
/// mock.set_method_error("create_checkout_session", PaymentError::provider("down"));
///
/// // Assert on what the handler sent
/// let request = mock.last_checkout_request().unwrap();
/// ```
#[derive(Default)]
pub struct MockPaymentProvider {
    /// Inner state (thread-safe for async tests).
    inner: Arc<Mutex<MockState>>,
}

/// Internal mutable state.
#[derive(Default)]
struct MockState {
    /// Customers created so far, by ID.
    customers: HashMap<String, Customer>,

    /// Subscriptions cancelled so far.
    cancelled_subscriptions: Vec<String>,

    /// Checkout requests received, in order.
    checkout_requests: Vec<CreateCheckoutRequest>,

    /// Next checkout session to return.
    next_checkout: Option<CheckoutSession>,

    /// Error to return on next call.
    next_error: Option<PaymentError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,

    /// Sequence for generated IDs.
    sequence: u64,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentProvider {
    /// Create a new mock provider with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Set the checkout session to return.
    pub fn set_checkout_session(&self, session: CheckoutSession) {
        self.inner.lock().unwrap().next_checkout = Some(session);
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.inner.lock().unwrap().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.inner
            .lock()
            .unwrap()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.inner.lock().unwrap();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().unwrap().call_log.clone()
    }

    /// Check if a method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Number of customers the mock has created.
    pub fn customer_count(&self) -> usize {
        self.inner.lock().unwrap().customers.len()
    }

    /// The most recent checkout request.
    pub fn last_checkout_request(&self) -> Option<CreateCheckoutRequest> {
        self.inner.lock().unwrap().checkout_requests.last().cloned()
    }

    /// Subscriptions cancelled through the mock.
    pub fn cancelled_subscriptions(&self) -> Vec<String> {
        self.inner.lock().unwrap().cancelled_subscriptions.clone()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.inner.lock().unwrap().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        let mut state = self.inner.lock().unwrap();

        // Check method-specific error first
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        // Check global error (consumes it)
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.inner.lock().unwrap();
        state.sequence += 1;
        format!("{}_mock_{}", prefix, state.sequence)
    }
}

impl Clone for MockPaymentProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        self.record_call(
            "create_customer",
            vec![
                request.account_id.to_string(),
                request.email.clone().unwrap_or_default(),
            ],
        );
        self.check_error("create_customer")?;

        let customer = Customer {
            id: self.next_id("cus"),
            email: request.email,
        };
        self.inner
            .lock()
            .unwrap()
            .customers
            .insert(customer.id.clone(), customer.clone());

        Ok(customer)
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.record_call(
            "create_checkout_session",
            vec![
                request.customer_id.clone(),
                request.mode.as_str().to_string(),
                request.client_reference_id.clone(),
            ],
        );
        self.check_error("create_checkout_session")?;

        let generated_id = self.next_id("cs");
        let mut state = self.inner.lock().unwrap();
        state.checkout_requests.push(request);

        let session = state.next_checkout.take().unwrap_or_else(|| CheckoutSession {
            url: format!("https://checkout.stripe.com/c/pay/{}", generated_id),
            id: generated_id,
        });

        Ok(session)
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        self.record_call(
            "create_portal_session",
            vec![customer_id.to_string(), return_url.to_string()],
        );
        self.check_error("create_portal_session")?;

        let id = self.next_id("bps");
        Ok(PortalSession {
            url: format!("https://billing.stripe.com/p/session/{}", id),
            id,
        })
    }

    async fn create_connect_account(
        &self,
        account_id: &AccountId,
        email: Option<&str>,
    ) -> Result<String, PaymentError> {
        self.record_call(
            "create_connect_account",
            vec![account_id.to_string(), email.unwrap_or_default().to_string()],
        );
        self.check_error("create_connect_account")?;

        Ok(self.next_id("acct"))
    }

    async fn create_connect_onboarding_link(
        &self,
        connect_account_id: &str,
        refresh_url: &str,
        return_url: &str,
    ) -> Result<String, PaymentError> {
        self.record_call(
            "create_connect_onboarding_link",
            vec![
                connect_account_id.to_string(),
                refresh_url.to_string(),
                return_url.to_string(),
            ],
        );
        self.check_error("create_connect_onboarding_link")?;

        Ok(format!(
            "https://connect.stripe.com/setup/e/{}",
            connect_account_id
        ))
    }

    async fn create_connect_dashboard_link(
        &self,
        connect_account_id: &str,
    ) -> Result<String, PaymentError> {
        self.record_call(
            "create_connect_dashboard_link",
            vec![connect_account_id.to_string()],
        );
        self.check_error("create_connect_dashboard_link")?;

        Ok(format!(
            "https://connect.stripe.com/express/{}",
            connect_account_id
        ))
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<(), PaymentError> {
        self.record_call("cancel_subscription", vec![subscription_id.to_string()]);
        self.check_error("cancel_subscription")?;

        self.inner
            .lock()
            .unwrap()
            .cancelled_subscriptions
            .push(subscription_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{CheckoutMode, LineItem, PaymentErrorCode};

    fn account_id() -> AccountId {
        AccountId::new("acc_1").unwrap()
    }

    fn checkout_request() -> CreateCheckoutRequest {
        CreateCheckoutRequest {
            customer_id: "cus_1".to_string(),
            mode: CheckoutMode::Payment,
            line_items: vec![LineItem::Price {
                price_id: "price_1".to_string(),
                quantity: 1,
            }],
            metadata: HashMap::new(),
            client_reference_id: "acc_1".to_string(),
            success_url: "https://app.test/ok".to_string(),
            cancel_url: "https://app.test/cancel".to_string(),
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Responses
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn create_customer_generates_unique_ids() {
        let mock = MockPaymentProvider::new();
        let request = CreateCustomerRequest {
            account_id: account_id(),
            email: Some("a@example.com".to_string()),
        };

        let first = mock.create_customer(request.clone()).await.unwrap();
        let second = mock.create_customer(request).await.unwrap();

        assert_ne!(first.id, second.id);
        assert!(first.id.starts_with("cus_"));
        assert_eq!(first.email.as_deref(), Some("a@example.com"));
        assert_eq!(mock.customer_count(), 2);
    }

    #[tokio::test]
    async fn checkout_session_returns_url_and_keeps_request() {
        let mock = MockPaymentProvider::new();

        let session = mock.create_checkout_session(checkout_request()).await.unwrap();

        assert!(session.url.contains(&session.id));
        let request = mock.last_checkout_request().unwrap();
        assert_eq!(request.customer_id, "cus_1");
    }

    #[tokio::test]
    async fn set_checkout_session_returns_configured() {
        let mock = MockPaymentProvider::new();
        mock.set_checkout_session(CheckoutSession {
            id: "cs_custom".to_string(),
            url: "https://custom.test/pay".to_string(),
        });

        let session = mock.create_checkout_session(checkout_request()).await.unwrap();

        assert_eq!(session.id, "cs_custom");
        assert_eq!(session.url, "https://custom.test/pay");
    }

    #[tokio::test]
    async fn cancel_subscription_is_recorded() {
        let mock = MockPaymentProvider::new();

        mock.cancel_subscription("sub_9").await.unwrap();

        assert_eq!(mock.cancelled_subscriptions(), vec!["sub_9".to_string()]);
    }

    // ══════════════════════════════════════════════════════════════
    // Error Injection
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn set_error_is_consumed_once() {
        let mock = MockPaymentProvider::new();
        mock.set_error(PaymentError::network("timeout"));

        let first = mock.create_portal_session("cus_1", "https://app.test").await;
        let second = mock.create_portal_session("cus_1", "https://app.test").await;

        assert_eq!(first.unwrap_err().code, PaymentErrorCode::NetworkError);
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn set_method_error_only_affects_method() {
        let mock = MockPaymentProvider::new();
        mock.set_method_error(
            "create_checkout_session",
            PaymentError::provider("upstream down"),
        );

        assert!(mock.create_checkout_session(checkout_request()).await.is_err());
        assert!(mock.create_portal_session("cus_1", "https://app.test").await.is_ok());

        mock.clear_errors();
        assert!(mock.create_checkout_session(checkout_request()).await.is_ok());
    }

    #[tokio::test]
    async fn failed_calls_do_not_create_customers() {
        let mock = MockPaymentProvider::new();
        mock.set_method_error("create_customer", PaymentError::provider("down"));

        let result = mock
            .create_customer(CreateCustomerRequest {
                account_id: account_id(),
                email: None,
            })
            .await;

        assert!(result.is_err());
        assert_eq!(mock.customer_count(), 0);
        assert!(mock.was_called("create_customer"));
    }

    // ══════════════════════════════════════════════════════════════
    // Call Tracking
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn call_log_contains_arguments() {
        let mock = MockPaymentProvider::new();

        mock.create_connect_dashboard_link("acct_1").await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "create_connect_dashboard_link");
        assert_eq!(calls[0].args, vec!["acct_1".to_string()]);
        assert_eq!(mock.call_count("create_connect_dashboard_link"), 1);
    }
}
