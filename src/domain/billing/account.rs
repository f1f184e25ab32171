//! Account aggregate.
//!
//! The Account is the authoritative record of what a tenant is entitled to:
//! plan tier, credit balance and the payment-provider identifiers linked to it.
//!
//! # Design Decisions
//!
//! - **Provider-independent id**: `AccountId` is the identity-provider subject,
//!   never a payment-provider id
//! - **Absolute subscription writes**: every subscription mutation replaces the
//!   tier, subscription id and period end rather than adjusting them
//! - **Event-time fence**: subscription fields carry the provider timestamp of
//!   the event that last wrote them; older events become no-ops
//! - **Credits are never negative**: consumption fails instead of overdrawing

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AccountId, DomainError, ErrorCode, Timestamp};

use super::PlanTier;

/// Account aggregate - one per registered user.
///
/// # Invariants
///
/// - `credit_balance` equals granted credits minus consumed credits
/// - `subscription_id` is `None` whenever `plan_tier` is `Free`
/// - `subscription_fenced_at` only moves forward
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub plan_tier: PlanTier,
    pub credit_balance: u64,

    /// Payment-provider customer, created lazily on first purchase.
    pub customer_id: Option<String>,

    /// Payment-provider connected account used for payouts.
    pub connect_account_id: Option<String>,

    pub subscription_id: Option<String>,
    pub subscription_period_end: Option<Timestamp>,

    /// Provider timestamp of the last applied subscription mutation.
    pub subscription_fenced_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An absolute statement about an account's subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionUpdate {
    /// A subscription checkout completed.
    Activate {
        tier: PlanTier,
        subscription_id: String,
        period_end: Option<Timestamp>,
    },

    /// The provider reports the subscription is still granting access.
    ///
    /// `tier` is `None` when the event did not allow the tier to be derived,
    /// in which case the stored tier is kept.
    Refresh {
        subscription_id: String,
        tier: Option<PlanTier>,
        period_end: Option<Timestamp>,
    },

    /// The subscription ended, explicitly or through a non-active status.
    Cancel { subscription_id: String },

    /// The account holder asked to go back to the free plan.
    Downgrade,
}

impl SubscriptionUpdate {
    /// Short label for logs and audit records.
    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionUpdate::Activate { .. } => "activate",
            SubscriptionUpdate::Refresh { .. } => "refresh",
            SubscriptionUpdate::Cancel { .. } => "cancel",
            SubscriptionUpdate::Downgrade => "downgrade",
        }
    }
}

/// Result of applying a [`SubscriptionUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionOutcome {
    Applied,
    /// A newer subscription event was already applied.
    Stale,
    /// The event concerns a subscription that is not the account's current one.
    NotCurrentSubscription,
}

impl Account {
    /// Creates a freshly registered account on the free plan with no credits.
    pub fn register(id: AccountId, now: Timestamp) -> Self {
        Self {
            id,
            plan_tier: PlanTier::Free,
            credit_balance: 0,
            customer_id: None,
            connect_account_id: None,
            subscription_id: None,
            subscription_period_end: None,
            subscription_fenced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Links a provider customer unless one is already linked.
    ///
    /// Returns the customer id that is linked afterwards.
    pub fn link_customer(&mut self, customer_id: &str, now: Timestamp) -> String {
        match &self.customer_id {
            Some(existing) => existing.clone(),
            None => {
                self.customer_id = Some(customer_id.to_string());
                self.updated_at = now;
                customer_id.to_string()
            }
        }
    }

    /// Links a provider connected account unless one is already linked.
    pub fn link_connect_account(&mut self, connect_account_id: &str, now: Timestamp) -> String {
        match &self.connect_account_id {
            Some(existing) => existing.clone(),
            None => {
                self.connect_account_id = Some(connect_account_id.to_string());
                self.updated_at = now;
                connect_account_id.to_string()
            }
        }
    }

    /// Applies a subscription statement issued at `event_at`.
    ///
    /// Statements older than the last applied one are rejected as `Stale`.
    /// Refresh and cancel statements about a subscription other than the
    /// linked one are rejected as `NotCurrentSubscription`, so a late event
    /// for a replaced subscription cannot clobber the current plan. An
    /// activation without a period end keeps the one already known for the
    /// same subscription.
    pub fn apply_subscription(
        &mut self,
        update: &SubscriptionUpdate,
        event_at: Timestamp,
        now: Timestamp,
    ) -> SubscriptionOutcome {
        if let Some(fenced_at) = self.subscription_fenced_at {
            if event_at.is_before(&fenced_at) {
                return SubscriptionOutcome::Stale;
            }
        }

        match update {
            SubscriptionUpdate::Activate {
                tier,
                subscription_id,
                period_end,
            } => {
                let same_subscription =
                    self.subscription_id.as_deref() == Some(subscription_id.as_str());
                if period_end.is_some() || !same_subscription {
                    self.subscription_period_end = *period_end;
                }
                self.plan_tier = *tier;
                self.subscription_id = Some(subscription_id.clone());
            }
            SubscriptionUpdate::Refresh {
                subscription_id,
                tier,
                period_end,
            } => {
                if !self.is_current_or_unlinked(subscription_id) {
                    return SubscriptionOutcome::NotCurrentSubscription;
                }
                self.subscription_id = Some(subscription_id.clone());
                if let Some(tier) = tier {
                    self.plan_tier = *tier;
                }
                if period_end.is_some() {
                    self.subscription_period_end = *period_end;
                }
            }
            SubscriptionUpdate::Cancel { subscription_id } => {
                if self.subscription_id.as_deref() != Some(subscription_id.as_str()) {
                    return SubscriptionOutcome::NotCurrentSubscription;
                }
                self.clear_subscription();
            }
            SubscriptionUpdate::Downgrade => self.clear_subscription(),
        }

        self.subscription_fenced_at = Some(event_at);
        self.updated_at = now;
        SubscriptionOutcome::Applied
    }

    /// Adds credits. Callers are responsible for per-event deduplication.
    pub fn add_credits(&mut self, credits: u64, now: Timestamp) -> Result<(), DomainError> {
        self.credit_balance = self.credit_balance.checked_add(credits).ok_or_else(|| {
            DomainError::new(ErrorCode::InternalError, "Credit balance overflow")
        })?;
        self.updated_at = now;
        Ok(())
    }

    /// Spends credits, failing rather than going negative.
    pub fn consume_credits(&mut self, credits: u64, now: Timestamp) -> Result<(), DomainError> {
        if credits > self.credit_balance {
            return Err(DomainError::new(
                ErrorCode::InsufficientCredits,
                format!(
                    "Cannot consume {} credits, balance is {}",
                    credits, self.credit_balance
                ),
            ));
        }
        self.credit_balance -= credits;
        self.updated_at = now;
        Ok(())
    }

    fn is_current_or_unlinked(&self, subscription_id: &str) -> bool {
        match &self.subscription_id {
            Some(current) => current == subscription_id,
            None => true,
        }
    }

    fn clear_subscription(&mut self) {
        self.plan_tier = PlanTier::Free;
        self.subscription_id = None;
        self.subscription_period_end = None;
    }
}
