//! Billing domain - Reconciling payment provider events into account state.
//!
//! # Flow
//!
//! ```text
//! raw body + signature header
//!     → EventVerifier      (authenticity, replay window)
//!     → EventClassifier    (event → ReconcileIntent)
//!     → IdempotentReconciler (intent → stores, once per event id)
//! ```
//!
//! Checkout sessions are created with [`PurchaseIntent`] metadata, which is
//! how a completed checkout finds its way back to an account.

mod account;
mod classifier;
mod event_verifier;
mod plan_tier;
mod provider_event;
mod purchase_intent;
mod reconcile_errors;
mod reconciler;

pub use account::{Account, SubscriptionOutcome, SubscriptionUpdate};
pub use classifier::{EventClassifier, ReconcileIntent};
pub use event_verifier::{EventVerifier, SignatureHeader};
pub use plan_tier::{PlanTier, PriceCatalog};
pub use provider_event::{
    CheckoutSessionObject, ProviderEvent, ProviderEventData, ProviderEventType,
    SubscriptionObject, SubscriptionStatus,
};
pub use purchase_intent::{metadata_keys, CreditPack, IntentKey, PurchaseIntent, MAX_AMOUNT_CENTS};
pub use reconcile_errors::ReconcileError;
pub use reconciler::IdempotentReconciler;
