//! Event classification.
//!
//! Maps a verified provider event to the single account mutation it implies.
//! The mapping is a pure function: it reads the event payload and the price
//! catalog, never a store.

use crate::domain::foundation::{AccountId, InvoiceId, JobPostId, Timestamp, ValidationError};

use super::provider_event::{
    CheckoutSessionObject, ProviderEvent, ProviderEventType, SubscriptionObject,
};
use super::purchase_intent::metadata_keys;
use super::{PlanTier, PriceCatalog, PurchaseIntent, ReconcileError};

/// The mutation a provider event asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileIntent {
    ActivateSubscription {
        account_id: AccountId,
        tier: PlanTier,
        customer_id: Option<String>,
        subscription_id: String,
    },
    AddCredits {
        account_id: AccountId,
        credits: u64,
        customer_id: Option<String>,
    },
    MarkInvoicePaid {
        account_id: AccountId,
        invoice_id: InvoiceId,
        amount_cents: u64,
    },
    FeatureJobPost {
        account_id: AccountId,
        job_post_id: JobPostId,
    },
    RefreshSubscription {
        subscription_id: String,
        account_hint: Option<AccountId>,
        tier: Option<PlanTier>,
        period_end: Option<Timestamp>,
    },
    CancelSubscription {
        subscription_id: String,
        account_hint: Option<AccountId>,
    },
    /// Acknowledge without mutating anything.
    Ignore { reason: String },
}

impl ReconcileIntent {
    /// Short label for logs and audit records.
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileIntent::ActivateSubscription { .. } => "activate_subscription",
            ReconcileIntent::AddCredits { .. } => "add_credits",
            ReconcileIntent::MarkInvoicePaid { .. } => "mark_invoice_paid",
            ReconcileIntent::FeatureJobPost { .. } => "feature_job_post",
            ReconcileIntent::RefreshSubscription { .. } => "refresh_subscription",
            ReconcileIntent::CancelSubscription { .. } => "cancel_subscription",
            ReconcileIntent::Ignore { .. } => "ignore",
        }
    }

    fn ignore(reason: impl Into<String>) -> Self {
        ReconcileIntent::Ignore {
            reason: reason.into(),
        }
    }
}

/// Classifies provider events against a price catalog.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    catalog: PriceCatalog,
}

impl EventClassifier {
    pub fn new(catalog: PriceCatalog) -> Self {
        Self { catalog }
    }

    /// Derives the intent of `event`.
    ///
    /// Unknown event types are ignored. A completed checkout lacking its
    /// account or intent metadata is a `Validation` error: the session was
    /// created without the metadata this system always attaches.
    pub fn classify(&self, event: &ProviderEvent) -> Result<ReconcileIntent, ReconcileError> {
        match event.parsed_type() {
            ProviderEventType::CheckoutSessionCompleted
            | ProviderEventType::CheckoutSessionAsyncPaymentSucceeded => {
                let session: CheckoutSessionObject = event
                    .deserialize_object()
                    .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))?;
                classify_checkout(session)
            }
            ProviderEventType::CustomerSubscriptionUpdated => {
                let subscription = self.subscription(event)?;
                Ok(self.classify_subscription_update(subscription))
            }
            ProviderEventType::CustomerSubscriptionDeleted => {
                let subscription = self.subscription(event)?;
                Ok(ReconcileIntent::CancelSubscription {
                    account_hint: account_hint(&subscription),
                    subscription_id: subscription.id,
                })
            }
            ProviderEventType::Unknown => Ok(ReconcileIntent::ignore(format!(
                "unhandled event type {}",
                event.event_type
            ))),
        }
    }

    fn subscription(&self, event: &ProviderEvent) -> Result<SubscriptionObject, ReconcileError> {
        event
            .deserialize_object()
            .map_err(|e| ReconcileError::MalformedPayload(e.to_string()))
    }

    fn classify_subscription_update(&self, subscription: SubscriptionObject) -> ReconcileIntent {
        if subscription.status.is_pending() {
            return ReconcileIntent::ignore("subscription awaiting first payment");
        }

        let account_hint = account_hint(&subscription);
        if !subscription.status.has_access() {
            return ReconcileIntent::CancelSubscription {
                subscription_id: subscription.id,
                account_hint,
            };
        }

        let tier = subscription
            .metadata
            .get(metadata_keys::TIER)
            .and_then(|t| t.parse::<PlanTier>().ok())
            .filter(PlanTier::is_paid)
            .or_else(|| {
                subscription
                    .price_id()
                    .and_then(|price| self.catalog.tier_for_price(price))
            });

        ReconcileIntent::RefreshSubscription {
            period_end: subscription.period_end(),
            subscription_id: subscription.id,
            account_hint,
            tier,
        }
    }
}

fn classify_checkout(session: CheckoutSessionObject) -> Result<ReconcileIntent, ReconcileError> {
    if session.mode == "setup" {
        return Ok(ReconcileIntent::ignore("setup-mode checkout"));
    }

    let (account_id, intent) = PurchaseIntent::from_metadata(&session.metadata)?;

    if !session.is_settled() {
        return Ok(ReconcileIntent::ignore("checkout payment not settled yet"));
    }

    match (session.mode.as_str(), intent) {
        ("subscription", PurchaseIntent::SubscribeToPlan { tier }) => {
            let subscription_id = session
                .subscription
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ValidationError::empty_field("subscription"))?;
            Ok(ReconcileIntent::ActivateSubscription {
                account_id,
                tier,
                customer_id: session.customer,
                subscription_id,
            })
        }
        ("subscription", other) => Err(mode_mismatch("subscription", &other)),
        ("payment", PurchaseIntent::BuyCredits { credits }) => Ok(ReconcileIntent::AddCredits {
            account_id,
            credits,
            customer_id: session.customer,
        }),
        ("payment", PurchaseIntent::PayInvoice {
            invoice_id,
            amount_cents,
        }) => Ok(ReconcileIntent::MarkInvoicePaid {
            account_id,
            invoice_id,
            amount_cents,
        }),
        ("payment", PurchaseIntent::FeatureJobPost { job_post_id }) => {
            Ok(ReconcileIntent::FeatureJobPost {
                account_id,
                job_post_id,
            })
        }
        ("payment", other) => Err(mode_mismatch("payment", &other)),
        (mode, _) => Err(ValidationError::invalid_format(
            "mode",
            format!("unsupported checkout mode '{}'", mode),
        )
        .into()),
    }
}

fn mode_mismatch(mode: &str, intent: &PurchaseIntent) -> ReconcileError {
    ValidationError::invalid_format(
        metadata_keys::INTENT,
        format!("intent '{}' cannot be paid in {} mode", intent.kind(), mode),
    )
    .into()
}

fn account_hint(subscription: &SubscriptionObject) -> Option<AccountId> {
    subscription
        .metadata
        .get(metadata_keys::ACCOUNT_ID)
        .and_then(|id| AccountId::new(id.as_str()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classifier() -> EventClassifier {
        EventClassifier::new(PriceCatalog::new("price_pro", "price_teams"))
    }

    fn event(event_type: &str, object: serde_json::Value) -> ProviderEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": event_type,
            "created": 1_704_067_200,
            "data": {"object": object},
            "livemode": false,
            "api_version": "2023-10-16"
        }))
        .unwrap()
    }

    fn checkout(mode: &str, metadata: serde_json::Value) -> ProviderEvent {
        let subscription = if mode == "subscription" {
            json!("sub_1")
        } else {
            serde_json::Value::Null
        };
        event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": mode,
                "payment_status": "paid",
                "customer": "cus_1",
                "subscription": subscription,
                "metadata": metadata
            }),
        )
    }

    fn acc(id: &str) -> AccountId {
        AccountId::new(id).unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // Checkout Completed
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn subscription_checkout_activates_tier_from_metadata() {
        let evt = checkout(
            "subscription",
            json!({"account_id": "acc_2", "intent": "subscribe", "tier": "teams"}),
        );

        let intent = classifier().classify(&evt).unwrap();

        assert_eq!(
            intent,
            ReconcileIntent::ActivateSubscription {
                account_id: acc("acc_2"),
                tier: PlanTier::Teams,
                customer_id: Some("cus_1".to_string()),
                subscription_id: "sub_1".to_string(),
            }
        );
    }

    #[test]
    fn payment_checkout_buying_credits_adds_credits() {
        let evt = checkout(
            "payment",
            json!({"account_id": "acc_1", "intent": "credits", "credits": "200"}),
        );

        let intent = classifier().classify(&evt).unwrap();

        assert_eq!(
            intent,
            ReconcileIntent::AddCredits {
                account_id: acc("acc_1"),
                credits: 200,
                customer_id: Some("cus_1".to_string()),
            }
        );
    }

    #[test]
    fn payment_checkout_for_invoice_marks_paid() {
        let evt = checkout(
            "payment",
            json!({"account_id": "acc_1", "intent": "invoice", "invoice_id": "inv_9", "amount_cents": "5000"}),
        );

        let intent = classifier().classify(&evt).unwrap();

        assert_eq!(
            intent,
            ReconcileIntent::MarkInvoicePaid {
                account_id: acc("acc_1"),
                invoice_id: InvoiceId::new("inv_9").unwrap(),
                amount_cents: 5000,
            }
        );
    }

    #[test]
    fn payment_checkout_for_job_post_features_it() {
        let evt = checkout(
            "payment",
            json!({"account_id": "acc_1", "intent": "job_post", "job_post_id": "job_7"}),
        );

        assert_eq!(
            classifier().classify(&evt).unwrap(),
            ReconcileIntent::FeatureJobPost {
                account_id: acc("acc_1"),
                job_post_id: JobPostId::new("job_7").unwrap(),
            }
        );
    }

    #[test]
    fn async_payment_success_is_classified_like_completion() {
        let evt = event(
            "checkout.session.async_payment_succeeded",
            json!({
                "id": "cs_1",
                "mode": "payment",
                "payment_status": "paid",
                "metadata": {"account_id": "acc_1", "intent": "credits", "credits": "50"}
            }),
        );

        assert!(matches!(
            classifier().classify(&evt).unwrap(),
            ReconcileIntent::AddCredits { credits: 50, .. }
        ));
    }

    #[test]
    fn unpaid_checkout_is_ignored() {
        let evt = event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": "payment",
                "payment_status": "unpaid",
                "metadata": {"account_id": "acc_1", "intent": "credits", "credits": "50"}
            }),
        );

        assert!(matches!(
            classifier().classify(&evt).unwrap(),
            ReconcileIntent::Ignore { .. }
        ));
    }

    #[test]
    fn checkout_missing_account_id_is_validation_error() {
        let evt = checkout("payment", json!({"intent": "credits", "credits": "200"}));

        let err = classifier().classify(&evt).unwrap_err();

        match err {
            ReconcileError::Validation(v) => assert_eq!(v.field(), "account_id"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn checkout_missing_intent_is_validation_error() {
        let evt = checkout("payment", json!({"account_id": "acc_1"}));

        assert!(matches!(
            classifier().classify(&evt),
            Err(ReconcileError::Validation(_))
        ));
    }

    #[test]
    fn checkout_without_metadata_is_validation_error_even_if_unpaid() {
        let evt = event(
            "checkout.session.completed",
            json!({"id": "cs_1", "mode": "payment", "payment_status": "unpaid"}),
        );

        assert!(matches!(
            classifier().classify(&evt),
            Err(ReconcileError::Validation(_))
        ));
    }

    #[test]
    fn subscription_intent_in_payment_mode_is_rejected() {
        let evt = checkout(
            "payment",
            json!({"account_id": "acc_1", "intent": "subscribe", "tier": "pro"}),
        );

        assert!(matches!(
            classifier().classify(&evt),
            Err(ReconcileError::Validation(_))
        ));
    }

    #[test]
    fn credit_intent_in_subscription_mode_is_rejected() {
        let evt = checkout(
            "subscription",
            json!({"account_id": "acc_1", "intent": "credits", "credits": "50"}),
        );

        assert!(matches!(
            classifier().classify(&evt),
            Err(ReconcileError::Validation(_))
        ));
    }

    #[test]
    fn subscription_checkout_without_subscription_id_is_rejected() {
        let evt = event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": "subscription",
                "payment_status": "paid",
                "metadata": {"account_id": "acc_1", "intent": "subscribe", "tier": "pro"}
            }),
        );

        assert!(matches!(
            classifier().classify(&evt),
            Err(ReconcileError::Validation(_))
        ));
    }

    #[test]
    fn setup_mode_checkout_is_ignored() {
        let evt = checkout("setup", json!({}));
        assert!(matches!(
            classifier().classify(&evt).unwrap(),
            ReconcileIntent::Ignore { .. }
        ));
    }

    // ══════════════════════════════════════════════════════════════
    // Subscription Events
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn active_subscription_update_refreshes_with_catalog_tier() {
        let evt = event(
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "status": "active",
                "current_period_end": 1_706_745_600,
                "items": {"data": [{"price": {"id": "price_teams"}}]}
            }),
        );

        let intent = classifier().classify(&evt).unwrap();

        assert_eq!(
            intent,
            ReconcileIntent::RefreshSubscription {
                subscription_id: "sub_1".to_string(),
                account_hint: None,
                tier: Some(PlanTier::Teams),
                period_end: Timestamp::from_unix_secs(1_706_745_600),
            }
        );
    }

    #[test]
    fn metadata_tier_takes_precedence_over_price() {
        let evt = event(
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "status": "trialing",
                "metadata": {"account_id": "acc_1", "tier": "pro"},
                "items": {"data": [{"price": {"id": "price_teams"}}]}
            }),
        );

        match classifier().classify(&evt).unwrap() {
            ReconcileIntent::RefreshSubscription {
                tier, account_hint, ..
            } => {
                assert_eq!(tier, Some(PlanTier::Pro));
                assert_eq!(account_hint, Some(acc("acc_1")));
            }
            other => panic!("Expected refresh, got {:?}", other),
        }
    }

    #[test]
    fn unknown_price_leaves_tier_unresolved() {
        let evt = event(
            "customer.subscription.updated",
            json!({
                "id": "sub_1",
                "status": "active",
                "items": {"data": [{"price": {"id": "price_legacy"}}]}
            }),
        );

        assert!(matches!(
            classifier().classify(&evt).unwrap(),
            ReconcileIntent::RefreshSubscription { tier: None, .. }
        ));
    }

    #[test]
    fn inactive_subscription_update_is_implicit_cancellation() {
        let evt = event(
            "customer.subscription.updated",
            json!({"id": "sub_1", "status": "unpaid"}),
        );

        assert_eq!(
            classifier().classify(&evt).unwrap(),
            ReconcileIntent::CancelSubscription {
                subscription_id: "sub_1".to_string(),
                account_hint: None,
            }
        );
    }

    #[test]
    fn incomplete_subscription_update_is_ignored() {
        let evt = event(
            "customer.subscription.updated",
            json!({"id": "sub_1", "status": "incomplete"}),
        );

        assert!(matches!(
            classifier().classify(&evt).unwrap(),
            ReconcileIntent::Ignore { .. }
        ));
    }

    #[test]
    fn subscription_deleted_cancels() {
        let evt = event(
            "customer.subscription.deleted",
            json!({"id": "sub_1", "status": "canceled", "metadata": {"account_id": "acc_2"}}),
        );

        assert_eq!(
            classifier().classify(&evt).unwrap(),
            ReconcileIntent::CancelSubscription {
                subscription_id: "sub_1".to_string(),
                account_hint: Some(acc("acc_2")),
            }
        );
    }

    #[test]
    fn malformed_subscription_object_is_rejected() {
        let evt = event("customer.subscription.deleted", json!({"status": "canceled"}));

        assert!(matches!(
            classifier().classify(&evt),
            Err(ReconcileError::MalformedPayload(_))
        ));
    }

    // ══════════════════════════════════════════════════════════════
    // Other Events
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn unhandled_event_type_is_ignored() {
        let evt = event("invoice.finalized", json!({"id": "in_1"}));

        assert!(matches!(
            classifier().classify(&evt).unwrap(),
            ReconcileIntent::Ignore { .. }
        ));
    }
}
