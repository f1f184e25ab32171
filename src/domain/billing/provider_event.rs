//! Payment-provider webhook event types.
//!
//! Only the fields the reconciler reads are captured; everything else in the
//! provider's schema is ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::Timestamp;

/// Webhook event as delivered by the payment provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEvent {
    /// Unique identifier for the event (evt_xxx format). Redeliveries reuse it.
    pub id: String,

    /// Type of event (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (Unix timestamp).
    pub created: i64,

    pub data: ProviderEventData,

    /// Whether this is a live mode event (vs test mode).
    #[serde(default)]
    pub livemode: bool,

    #[serde(default)]
    pub api_version: Option<String>,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEventData {
    /// The object that triggered the event (polymorphic based on event type).
    pub object: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl ProviderEvent {
    /// Parses the type string into a known event type.
    pub fn parsed_type(&self) -> ProviderEventType {
        ProviderEventType::from_str(&self.event_type)
    }

    /// Provider-assigned creation time, used to order subscription events.
    pub fn occurred_at(&self) -> Option<Timestamp> {
        Timestamp::from_unix_secs(self.created)
    }

    /// Attempts to deserialize the data object as the specified type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

/// Event types the classifier distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEventType {
    CheckoutSessionCompleted,
    /// A delayed payment method (bank debit) settled after checkout completed.
    CheckoutSessionAsyncPaymentSucceeded,
    CustomerSubscriptionUpdated,
    CustomerSubscriptionDeleted,
    Unknown,
}

impl ProviderEventType {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" => ProviderEventType::CheckoutSessionCompleted,
            "checkout.session.async_payment_succeeded" => {
                ProviderEventType::CheckoutSessionAsyncPaymentSucceeded
            }
            "customer.subscription.updated" => ProviderEventType::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => ProviderEventType::CustomerSubscriptionDeleted,
            _ => ProviderEventType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderEventType::CheckoutSessionCompleted => "checkout.session.completed",
            ProviderEventType::CheckoutSessionAsyncPaymentSucceeded => {
                "checkout.session.async_payment_succeeded"
            }
            ProviderEventType::CustomerSubscriptionUpdated => "customer.subscription.updated",
            ProviderEventType::CustomerSubscriptionDeleted => "customer.subscription.deleted",
            ProviderEventType::Unknown => "unknown",
        }
    }
}

/// Checkout session object embedded in checkout events.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSessionObject {
    pub id: String,

    /// "payment", "subscription" or "setup".
    pub mode: String,

    /// "paid", "unpaid" or "no_payment_required".
    #[serde(default)]
    pub payment_status: Option<String>,

    #[serde(default)]
    pub customer: Option<String>,

    #[serde(default)]
    pub subscription: Option<String>,

    #[serde(default)]
    pub amount_total: Option<i64>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    /// True once funds are captured (or nothing was owed).
    pub fn is_settled(&self) -> bool {
        !matches!(self.payment_status.as_deref(), Some("unpaid"))
    }
}

/// Subscription object embedded in subscription events.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionObject {
    pub id: String,

    pub status: SubscriptionStatus,

    #[serde(default)]
    pub customer: Option<String>,

    #[serde(default)]
    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    #[serde(default)]
    pub items: Option<SubscriptionItems>,
}

impl SubscriptionObject {
    /// Price id of the first subscription item, if any.
    pub fn price_id(&self) -> Option<&str> {
        self.items
            .as_ref()
            .and_then(|items| items.data.first())
            .map(|item| item.price.id.as_str())
    }

    pub fn period_end(&self) -> Option<Timestamp> {
        self.current_period_end.and_then(Timestamp::from_unix_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionItem {
    pub price: SubscriptionPrice,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionPrice {
    pub id: String,
}

/// Provider subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// Whether the account keeps its paid tier under this status.
    ///
    /// `past_due` keeps access while the provider retries the payment.
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::PastDue
        )
    }

    /// A subscription still waiting for its first payment has not started yet.
    pub fn is_pending(&self) -> bool {
        matches!(self, SubscriptionStatus::Incomplete)
    }
}
