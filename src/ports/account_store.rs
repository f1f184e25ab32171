//! AccountStore port - Authoritative account state.
//!
//! Every mutating operation is a single atomic step at the storage layer.
//! Callers never read an account, modify it and write it back; they ask the
//! store to apply a change and report what happened.

use async_trait::async_trait;

use crate::domain::billing::{Account, SubscriptionOutcome, SubscriptionUpdate};
use crate::domain::foundation::{AccountId, DomainError, Timestamp};

/// Result of a keyed credit grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Balance was incremented; this was the first grant for the event.
    Applied,
    /// A grant for this event id already exists; balance unchanged.
    AlreadyApplied,
}

/// Port for account persistence.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a newly registered account.
    ///
    /// # Errors
    ///
    /// `AccountAlreadyExists` if an account with this id exists.
    async fn create(&self, account: &Account) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, DomainError>;

    /// Find the account whose linked subscription is `subscription_id`.
    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Account>, DomainError>;

    /// Link a provider customer unless one is already linked.
    ///
    /// Returns the customer id linked after the call, which is the existing
    /// one if another request got there first.
    async fn link_customer(&self, id: &AccountId, customer_id: &str)
        -> Result<String, DomainError>;

    /// Link a provider connected account unless one is already linked.
    async fn link_connect_account(
        &self,
        id: &AccountId,
        connect_account_id: &str,
    ) -> Result<String, DomainError>;

    /// Apply a subscription statement issued at `event_at`, fenced by the
    /// timestamp of the last applied statement.
    async fn apply_subscription(
        &self,
        id: &AccountId,
        update: &SubscriptionUpdate,
        event_at: Timestamp,
    ) -> Result<SubscriptionOutcome, DomainError>;

    /// Add `credits` once per `event_id`.
    ///
    /// The duplicate check and the increment happen in one atomic step so two
    /// concurrent deliveries of one event cannot both increment.
    async fn grant_credits(
        &self,
        id: &AccountId,
        event_id: &str,
        credits: u64,
    ) -> Result<GrantOutcome, DomainError>;

    /// Subtract `credits`, returning the new balance.
    ///
    /// # Errors
    ///
    /// `InsufficientCredits` if the balance is lower than `credits`.
    async fn consume_credits(&self, id: &AccountId, credits: u64) -> Result<u64, DomainError>;
}
