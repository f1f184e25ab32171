//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `AccountStore` - Plan, credits and provider links per account
//! - `InvoiceStore` - Invoice payment state
//! - `JobPostStore` - Featured job posts
//! - `WebhookEventRepository` - Provider event idempotency tracking
//!
//! ## External Service Ports
//!
//! - `PaymentProvider` - Checkout, portal and connected accounts
//! - `SessionValidator` - Bearer token validation

mod account_store;
mod invoice_store;
mod job_post_store;
mod payment_provider;
mod session_validator;
mod webhook_event_repository;

pub use account_store::{AccountStore, GrantOutcome};
pub use invoice_store::{Invoice, InvoiceStore, MarkPaidOutcome};
pub use job_post_store::{FeatureOutcome, JobPost, JobPostStore};
pub use payment_provider::{
    CheckoutMode, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer,
    LineItem, PaymentError, PaymentErrorCode, PaymentProvider, PortalSession,
};
pub use session_validator::SessionValidator;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookResult,
};
