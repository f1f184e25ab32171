//! Idempotent reconciler - applies provider events to account state once.
//!
//! ## Steps
//!
//! 1. Skip the event if a record for its id already exists
//! 2. Classify it into a [`ReconcileIntent`]
//! 3. Apply the intent through the stores
//! 4. Record the final outcome (applied or ignored)
//!
//! Failures in steps 2 and 3 leave no record, so the provider's redelivery
//! re-runs them. Every store operation in step 3 is itself idempotent
//! (absolute writes, conditional updates, or credit grants keyed by event
//! id), so a crash between steps 3 and 4 is harmless.
//!
//! ## Race Condition Handling
//!
//! When two deliveries of one event run concurrently both may pass step 1.
//! The keyed credit grant lets only one of them increment; the record's
//! PRIMARY KEY lets only one of them insert, the other reports
//! `AlreadyProcessed`.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::foundation::{AccountId, Timestamp};
use crate::ports::{
    AccountStore, FeatureOutcome, GrantOutcome, InvoiceStore, JobPostStore, MarkPaidOutcome,
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookResult,
};

use super::{
    EventClassifier, ProviderEvent, ReconcileError, ReconcileIntent, SubscriptionOutcome,
    SubscriptionUpdate,
};

/// What applying an intent did.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Applied {
    Changed,
    Unchanged(String),
}

/// Applies verified provider events to the stores exactly once.
pub struct IdempotentReconciler {
    classifier: EventClassifier,
    accounts: Arc<dyn AccountStore>,
    invoices: Arc<dyn InvoiceStore>,
    job_posts: Arc<dyn JobPostStore>,
    events: Arc<dyn WebhookEventRepository>,
}

impl IdempotentReconciler {
    pub fn new(
        classifier: EventClassifier,
        accounts: Arc<dyn AccountStore>,
        invoices: Arc<dyn InvoiceStore>,
        job_posts: Arc<dyn JobPostStore>,
        events: Arc<dyn WebhookEventRepository>,
    ) -> Self {
        Self {
            classifier,
            accounts,
            invoices,
            job_posts,
            events,
        }
    }

    /// Reconcile one verified event.
    ///
    /// # Returns
    ///
    /// - `Ok(Processed)` - the intent changed state
    /// - `Ok(Ignored)` - acknowledged without a change (unhandled type,
    ///   stale subscription event, duplicate grant)
    /// - `Ok(AlreadyProcessed)` - an earlier delivery already reconciled it
    /// - `Err(_)` - nothing was recorded; see [`ReconcileError::status_code`]
    pub async fn process(&self, event: &ProviderEvent) -> Result<WebhookResult, ReconcileError> {
        if self.events.find_by_event_id(&event.id).await?.is_some() {
            debug!(event_id = %event.id, event_type = %event.event_type, "Duplicate delivery skipped");
            return Ok(WebhookResult::AlreadyProcessed);
        }

        let intent = self.classifier.classify(event).map_err(|e| {
            warn!(event_id = %event.id, event_type = %event.event_type, error = %e, "Event rejected by classifier");
            e
        })?;

        let applied = self.apply(event, &intent).await.map_err(|e| {
            if e.is_retryable() {
                error!(event_id = %event.id, intent = intent.label(), error = %e, "Reconciliation failed, awaiting redelivery");
            } else {
                warn!(event_id = %event.id, intent = intent.label(), error = %e, "Reconciliation rejected");
            }
            e
        })?;

        let payload = serde_json::to_value(event)
            .map_err(|e| ReconcileError::MalformedPayload(format!("Failed to serialize event: {}", e)))?;
        let (record, result) = match applied {
            Applied::Changed => (
                WebhookEventRecord::success(&event.id, &event.event_type, intent.label(), payload),
                WebhookResult::Processed,
            ),
            Applied::Unchanged(reason) => {
                debug!(event_id = %event.id, intent = intent.label(), reason = %reason, "Event acknowledged without change");
                (
                    WebhookEventRecord::ignored(
                        &event.id,
                        &event.event_type,
                        intent.label(),
                        reason,
                        payload,
                    ),
                    WebhookResult::Ignored,
                )
            }
        };

        match self.events.save(record).await? {
            SaveResult::Inserted => Ok(result),
            SaveResult::AlreadyExists => Ok(WebhookResult::AlreadyProcessed),
        }
    }

    async fn apply(
        &self,
        event: &ProviderEvent,
        intent: &ReconcileIntent,
    ) -> Result<Applied, ReconcileError> {
        match intent {
            ReconcileIntent::ActivateSubscription {
                account_id,
                tier,
                customer_id,
                subscription_id,
            } => {
                self.link_customer(account_id, customer_id.as_deref()).await?;
                let update = SubscriptionUpdate::Activate {
                    tier: *tier,
                    subscription_id: subscription_id.clone(),
                    period_end: None,
                };
                self.apply_subscription(event, account_id, &update).await
            }

            ReconcileIntent::AddCredits {
                account_id,
                credits,
                customer_id,
            } => {
                self.link_customer(account_id, customer_id.as_deref()).await?;
                match self
                    .accounts
                    .grant_credits(account_id, &event.id, *credits)
                    .await?
                {
                    GrantOutcome::Applied => {
                        info!(event_id = %event.id, account_id = %account_id, credits, "Credits granted");
                        Ok(Applied::Changed)
                    }
                    GrantOutcome::AlreadyApplied => {
                        Ok(Applied::Unchanged("credits already granted for event".into()))
                    }
                }
            }

            ReconcileIntent::MarkInvoicePaid {
                account_id,
                invoice_id,
                amount_cents,
            } => {
                let paid_at = event_time(event)?;
                match self
                    .invoices
                    .mark_paid(invoice_id, account_id, *amount_cents, paid_at)
                    .await?
                {
                    MarkPaidOutcome::MarkedPaid => {
                        info!(event_id = %event.id, invoice_id = %invoice_id, amount_cents, "Invoice marked paid");
                        Ok(Applied::Changed)
                    }
                    MarkPaidOutcome::AlreadyPaid => {
                        Ok(Applied::Unchanged("invoice already paid".into()))
                    }
                }
            }

            ReconcileIntent::FeatureJobPost {
                account_id,
                job_post_id,
            } => {
                let featured_at = event_time(event)?;
                match self
                    .job_posts
                    .mark_featured(job_post_id, account_id, featured_at)
                    .await?
                {
                    FeatureOutcome::Featured => {
                        info!(event_id = %event.id, job_post_id = %job_post_id, "Job post featured");
                        Ok(Applied::Changed)
                    }
                    FeatureOutcome::AlreadyFeatured => {
                        Ok(Applied::Unchanged("job post already featured".into()))
                    }
                }
            }

            ReconcileIntent::RefreshSubscription {
                subscription_id,
                account_hint,
                tier,
                period_end,
            } => {
                let account_id = self
                    .resolve_subscription_account(subscription_id, account_hint.as_ref())
                    .await?;
                let update = SubscriptionUpdate::Refresh {
                    subscription_id: subscription_id.clone(),
                    tier: *tier,
                    period_end: *period_end,
                };
                self.apply_subscription(event, &account_id, &update).await
            }

            ReconcileIntent::CancelSubscription {
                subscription_id,
                account_hint,
            } => {
                let account_id = self
                    .resolve_subscription_account(subscription_id, account_hint.as_ref())
                    .await?;
                let update = SubscriptionUpdate::Cancel {
                    subscription_id: subscription_id.clone(),
                };
                self.apply_subscription(event, &account_id, &update).await
            }

            ReconcileIntent::Ignore { reason } => Ok(Applied::Unchanged(reason.clone())),
        }
    }

    async fn apply_subscription(
        &self,
        event: &ProviderEvent,
        account_id: &AccountId,
        update: &SubscriptionUpdate,
    ) -> Result<Applied, ReconcileError> {
        let event_at = event_time(event)?;
        match self
            .accounts
            .apply_subscription(account_id, update, event_at)
            .await?
        {
            SubscriptionOutcome::Applied => {
                info!(event_id = %event.id, account_id = %account_id, update = update.label(), "Subscription state applied");
                Ok(Applied::Changed)
            }
            SubscriptionOutcome::Stale => {
                warn!(event_id = %event.id, account_id = %account_id, update = update.label(), "Stale subscription event");
                Ok(Applied::Unchanged(
                    "older than the last applied subscription event".into(),
                ))
            }
            SubscriptionOutcome::NotCurrentSubscription => Ok(Applied::Unchanged(
                "subscription is not the account's current subscription".into(),
            )),
        }
    }

    async fn link_customer(
        &self,
        account_id: &AccountId,
        customer_id: Option<&str>,
    ) -> Result<(), ReconcileError> {
        if let Some(customer_id) = customer_id.filter(|c| !c.is_empty()) {
            self.accounts.link_customer(account_id, customer_id).await?;
        }
        Ok(())
    }

    /// The linked account wins over the metadata hint.
    async fn resolve_subscription_account(
        &self,
        subscription_id: &str,
        hint: Option<&AccountId>,
    ) -> Result<AccountId, ReconcileError> {
        if let Some(account) = self.accounts.find_by_subscription_id(subscription_id).await? {
            return Ok(account.id);
        }
        hint.cloned().ok_or_else(|| {
            ReconcileError::AccountNotFound(format!(
                "no account linked to subscription {}",
                subscription_id
            ))
        })
    }
}

fn event_time(event: &ProviderEvent) -> Result<Timestamp, ReconcileError> {
    event.occurred_at().ok_or_else(|| {
        ReconcileError::MalformedPayload(format!("invalid created timestamp {}", event.created))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryAccountStore, InMemoryInvoiceStore, InMemoryJobPostStore,
        InMemoryWebhookEventRepository,
    };
    use crate::domain::billing::{Account, PlanTier, PriceCatalog};
    use crate::domain::foundation::{InvoiceId, JobPostId};
    use crate::ports::InvoiceStore;
    use serde_json::json;

    // ══════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ══════════════════════════════════════════════════════════════

    const T0: i64 = 1_704_067_200;

    struct Harness {
        reconciler: IdempotentReconciler,
        accounts: InMemoryAccountStore,
        invoices: InMemoryInvoiceStore,
        job_posts: InMemoryJobPostStore,
        events: InMemoryWebhookEventRepository,
    }

    async fn harness(account_ids: &[&str]) -> Harness {
        let accounts = InMemoryAccountStore::with_accounts(
            account_ids
                .iter()
                .map(|id| Account::register(acc(id), Timestamp::now())),
        )
        .await;
        let invoices = InMemoryInvoiceStore::new();
        let job_posts = InMemoryJobPostStore::new();
        let events = InMemoryWebhookEventRepository::new();
        let reconciler = IdempotentReconciler::new(
            EventClassifier::new(PriceCatalog::new("price_pro", "price_teams")),
            Arc::new(accounts.clone()),
            Arc::new(invoices.clone()),
            Arc::new(job_posts.clone()),
            Arc::new(events.clone()),
        );
        Harness {
            reconciler,
            accounts,
            invoices,
            job_posts,
            events,
        }
    }

    fn acc(id: &str) -> AccountId {
        AccountId::new(id).unwrap()
    }

    fn event(id: &str, event_type: &str, created: i64, object: serde_json::Value) -> ProviderEvent {
        serde_json::from_value(json!({
            "id": id,
            "type": event_type,
            "created": created,
            "data": {"object": object},
            "livemode": false,
            "api_version": "2023-10-16"
        }))
        .unwrap()
    }

    fn credits_checkout(id: &str, account: &str, credits: u64) -> ProviderEvent {
        event(
            id,
            "checkout.session.completed",
            T0,
            json!({
                "id": "cs_credits",
                "mode": "payment",
                "payment_status": "paid",
                "customer": "cus_1",
                "metadata": {"account_id": account, "intent": "credits", "credits": credits.to_string()}
            }),
        )
    }

    fn subscription_checkout(id: &str, account: &str, tier: &str, sub: &str, created: i64) -> ProviderEvent {
        event(
            id,
            "checkout.session.completed",
            created,
            json!({
                "id": "cs_sub",
                "mode": "subscription",
                "payment_status": "paid",
                "customer": "cus_2",
                "subscription": sub,
                "metadata": {"account_id": account, "intent": "subscribe", "tier": tier}
            }),
        )
    }

    fn subscription_event(id: &str, event_type: &str, sub: &str, status: &str, created: i64) -> ProviderEvent {
        event(
            id,
            event_type,
            created,
            json!({"id": sub, "status": status, "current_period_end": T0 + 30 * 86_400}),
        )
    }

    async fn account(h: &Harness, id: &str) -> Account {
        use crate::ports::AccountStore;
        h.accounts.find_by_id(&acc(id)).await.unwrap().unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // Credit Grants
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn credit_purchase_redelivered_grants_once() {
        let h = harness(&["acc_1"]).await;
        let evt = credits_checkout("evt_1", "acc_1", 200);

        let first = h.reconciler.process(&evt).await.unwrap();
        let second = h.reconciler.process(&evt).await.unwrap();

        assert_eq!(first, WebhookResult::Processed);
        assert_eq!(second, WebhookResult::AlreadyProcessed);
        let acc1 = account(&h, "acc_1").await;
        assert_eq!(acc1.credit_balance, 200);
        assert_eq!(acc1.customer_id.as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn distinct_events_grant_separately() {
        let h = harness(&["acc_1"]).await;

        h.reconciler.process(&credits_checkout("evt_1", "acc_1", 50)).await.unwrap();
        h.reconciler.process(&credits_checkout("evt_2", "acc_1", 200)).await.unwrap();

        assert_eq!(account(&h, "acc_1").await.credit_balance, 250);
    }

    #[tokio::test]
    async fn grant_after_lost_record_is_not_doubled() {
        let h = harness(&["acc_1"]).await;
        let evt = credits_checkout("evt_1", "acc_1", 200);
        h.reconciler.process(&evt).await.unwrap();

        // simulate a crash between the grant and the record
        h.events.delete_before(chrono::Utc::now() + chrono::Duration::days(1)).await.unwrap();
        let result = h.reconciler.process(&evt).await.unwrap();

        assert_eq!(result, WebhookResult::Ignored);
        assert_eq!(account(&h, "acc_1").await.credit_balance, 200);
    }

    // ══════════════════════════════════════════════════════════════
    // Failures
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn missing_account_metadata_rejected_without_mutation() {
        let h = harness(&["acc_1"]).await;
        let evt = event(
            "evt_8",
            "checkout.session.completed",
            T0,
            json!({
                "id": "cs_1",
                "mode": "payment",
                "payment_status": "paid",
                "metadata": {"intent": "credits", "credits": "200"}
            }),
        );

        let err = h.reconciler.process(&evt).await.unwrap_err();

        assert!(matches!(err, ReconcileError::Validation(_)));
        assert_eq!(account(&h, "acc_1").await.credit_balance, 0);
        assert!(h.events.is_empty().await);
    }

    #[tokio::test]
    async fn store_failure_is_retryable_and_leaves_no_record() {
        let h = harness(&["acc_1"]).await;
        let evt = credits_checkout("evt_1", "acc_1", 200);
        h.accounts.set_fail_writes(true);

        let err = h.reconciler.process(&evt).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(h.events.is_empty().await);

        h.accounts.set_fail_writes(false);
        assert_eq!(h.reconciler.process(&evt).await.unwrap(), WebhookResult::Processed);
        assert_eq!(account(&h, "acc_1").await.credit_balance, 200);
    }

    #[tokio::test]
    async fn unknown_account_is_retryable() {
        let h = harness(&[]).await;

        let err = h
            .reconciler
            .process(&credits_checkout("evt_1", "acc_ghost", 50))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::AccountNotFound(_)));
        assert!(err.is_retryable());
    }

    // ══════════════════════════════════════════════════════════════
    // Subscriptions
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn teams_activation_then_deletion_returns_to_free() {
        let h = harness(&["acc_2"]).await;

        h.reconciler
            .process(&subscription_checkout("evt_2", "acc_2", "teams", "sub_9", T0))
            .await
            .unwrap();
        let activated = account(&h, "acc_2").await;
        assert_eq!(activated.plan_tier, PlanTier::Teams);
        assert_eq!(activated.subscription_id.as_deref(), Some("sub_9"));

        h.reconciler
            .process(&subscription_event(
                "evt_3",
                "customer.subscription.deleted",
                "sub_9",
                "canceled",
                T0 + 60,
            ))
            .await
            .unwrap();
        let cancelled = account(&h, "acc_2").await;
        assert_eq!(cancelled.plan_tier, PlanTier::Free);
        assert!(cancelled.subscription_id.is_none());
    }

    #[tokio::test]
    async fn update_refreshes_period_end_and_tier() {
        let h = harness(&["acc_2"]).await;
        h.reconciler
            .process(&subscription_checkout("evt_2", "acc_2", "pro", "sub_9", T0))
            .await
            .unwrap();

        let update = event(
            "evt_3",
            "customer.subscription.updated",
            T0 + 10,
            json!({
                "id": "sub_9",
                "status": "active",
                "current_period_end": T0 + 86_400,
                "items": {"data": [{"price": {"id": "price_teams"}}]}
            }),
        );
        h.reconciler.process(&update).await.unwrap();

        let acc2 = account(&h, "acc_2").await;
        assert_eq!(acc2.plan_tier, PlanTier::Teams);
        assert_eq!(acc2.subscription_period_end, Timestamp::from_unix_secs(T0 + 86_400));
    }

    #[tokio::test]
    async fn checkout_after_early_update_keeps_period_end() {
        let h = harness(&["acc_2"]).await;

        let early_update = event(
            "evt_3",
            "customer.subscription.updated",
            T0,
            json!({
                "id": "sub_9",
                "status": "active",
                "current_period_end": T0 + 30 * 86_400,
                "metadata": {"account_id": "acc_2"}
            }),
        );
        h.reconciler.process(&early_update).await.unwrap();
        h.reconciler
            .process(&subscription_checkout("evt_2", "acc_2", "pro", "sub_9", T0 + 1))
            .await
            .unwrap();

        let acc2 = account(&h, "acc_2").await;
        assert_eq!(acc2.plan_tier, PlanTier::Pro);
        assert_eq!(acc2.subscription_id.as_deref(), Some("sub_9"));
        assert_eq!(
            acc2.subscription_period_end,
            Timestamp::from_unix_secs(T0 + 30 * 86_400)
        );
    }

    #[tokio::test]
    async fn past_due_to_unpaid_is_implicit_cancel() {
        let h = harness(&["acc_2"]).await;
        h.reconciler
            .process(&subscription_checkout("evt_2", "acc_2", "pro", "sub_9", T0))
            .await
            .unwrap();

        h.reconciler
            .process(&subscription_event(
                "evt_3",
                "customer.subscription.updated",
                "sub_9",
                "unpaid",
                T0 + 10,
            ))
            .await
            .unwrap();

        assert_eq!(account(&h, "acc_2").await.plan_tier, PlanTier::Free);
    }

    #[tokio::test]
    async fn out_of_order_update_is_fenced() {
        let h = harness(&["acc_2"]).await;
        h.reconciler
            .process(&subscription_checkout("evt_2", "acc_2", "teams", "sub_9", T0 + 100))
            .await
            .unwrap();

        let stale = subscription_event(
            "evt_1",
            "customer.subscription.updated",
            "sub_9",
            "canceled",
            T0,
        );
        let result = h.reconciler.process(&stale).await.unwrap();

        assert_eq!(result, WebhookResult::Ignored);
        assert_eq!(account(&h, "acc_2").await.plan_tier, PlanTier::Teams);
    }

    #[tokio::test]
    async fn deletion_of_unknown_subscription_is_retryable() {
        let h = harness(&["acc_2"]).await;

        let err = h
            .reconciler
            .process(&subscription_event(
                "evt_3",
                "customer.subscription.deleted",
                "sub_x",
                "canceled",
                T0,
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn deletion_of_replaced_subscription_is_ignored() {
        let h = harness(&["acc_2"]).await;
        h.reconciler
            .process(&subscription_checkout("evt_2", "acc_2", "teams", "sub_new", T0))
            .await
            .unwrap();

        let old_deleted = event(
            "evt_3",
            "customer.subscription.deleted",
            T0 + 10,
            json!({"id": "sub_old", "status": "canceled", "metadata": {"account_id": "acc_2"}}),
        );
        let result = h.reconciler.process(&old_deleted).await.unwrap();

        assert_eq!(result, WebhookResult::Ignored);
        assert_eq!(account(&h, "acc_2").await.plan_tier, PlanTier::Teams);
    }

    // ══════════════════════════════════════════════════════════════
    // Invoices and Job Posts
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn invoice_payment_sets_timestamp_once() {
        let h = harness(&["acc_1"]).await;
        let invoice_id = InvoiceId::new("inv_9").unwrap();
        h.invoices.insert_unpaid(invoice_id.clone(), acc("acc_1"), 5_000).await;
        let evt = event(
            "evt_7",
            "checkout.session.completed",
            T0,
            json!({
                "id": "cs_inv",
                "mode": "payment",
                "payment_status": "paid",
                "metadata": {"account_id": "acc_1", "intent": "invoice", "invoice_id": "inv_9", "amount_cents": "5000"}
            }),
        );

        h.reconciler.process(&evt).await.unwrap();
        let paid_at = h.invoices.find_by_id(&invoice_id).await.unwrap().unwrap().paid_at;
        h.reconciler.process(&evt).await.unwrap();

        let invoice = h.invoices.find_by_id(&invoice_id).await.unwrap().unwrap();
        assert_eq!(paid_at, Timestamp::from_unix_secs(T0));
        assert_eq!(invoice.paid_at, paid_at);
        assert_eq!(invoice.paid_amount_cents, Some(5_000));
    }

    #[tokio::test]
    async fn job_post_is_featured() {
        use crate::ports::JobPostStore;

        let h = harness(&["acc_1"]).await;
        let job_post_id = JobPostId::new("job_7").unwrap();
        h.job_posts.insert(job_post_id.clone(), acc("acc_1")).await;
        let evt = event(
            "evt_5",
            "checkout.session.completed",
            T0,
            json!({
                "id": "cs_job",
                "mode": "payment",
                "payment_status": "paid",
                "metadata": {"account_id": "acc_1", "intent": "job_post", "job_post_id": "job_7"}
            }),
        );

        assert_eq!(h.reconciler.process(&evt).await.unwrap(), WebhookResult::Processed);
        let post = h.job_posts.find_by_id(&job_post_id).await.unwrap().unwrap();
        assert!(post.featured_at.is_some());
    }

    // ══════════════════════════════════════════════════════════════
    // Unhandled Events
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unhandled_event_is_acknowledged_and_recorded() {
        let h = harness(&["acc_1"]).await;
        let evt = event("evt_9", "invoice.finalized", T0, json!({"id": "in_1"}));

        assert_eq!(h.reconciler.process(&evt).await.unwrap(), WebhookResult::Ignored);
        let record = h.events.find_by_event_id("evt_9").await.unwrap().unwrap();
        assert_eq!(record.result, "ignored");
    }
}
