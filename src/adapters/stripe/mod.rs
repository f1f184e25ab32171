//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port for Stripe, covering:
//! - Customer creation
//! - Checkout and customer portal sessions
//! - Connected accounts (Express onboarding and dashboard links)
//! - Subscription cancellation
//!
//! Inbound webhook verification lives in the billing domain
//! (`EventVerifier`), not here. `sign_payload` and `MockPaymentProvider` are
//! test fixtures.

mod mock_payment_provider;
mod stripe_adapter;
mod webhook_fixture;

pub use mock_payment_provider::{MethodCall, MockPaymentProvider};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
pub use webhook_fixture::sign_payload;
