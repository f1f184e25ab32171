//! In-memory account store.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::{Account, SubscriptionOutcome, SubscriptionUpdate};
use crate::domain::foundation::{AccountId, DomainError, ErrorCode, Timestamp};
use crate::ports::{AccountStore, GrantOutcome};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    /// Event ids that already granted credits.
    credit_grants: HashSet<String>,
}

/// In-memory account storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountStore {
    state: Arc<RwLock<State>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with accounts.
    pub async fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.write().await;
            for account in accounts {
                state.accounts.insert(account.id.clone(), account);
            }
        }
        store
    }

    /// Makes every subsequent write fail with a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of distinct events that granted credits.
    pub async fn grant_count(&self) -> usize {
        self.state.read().await.credit_grants.len()
    }

    fn check_writable(&self) -> Result<(), DomainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::database("simulated write failure"));
        }
        Ok(())
    }
}

fn not_found(id: &AccountId) -> DomainError {
    DomainError::new(ErrorCode::AccountNotFound, format!("Account {} not found", id))
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create(&self, account: &Account) -> Result<(), DomainError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        if state.accounts.contains_key(&account.id) {
            return Err(DomainError::new(
                ErrorCode::AccountAlreadyExists,
                format!("Account {} already exists", account.id),
            ));
        }
        state.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, DomainError> {
        Ok(self.state.read().await.accounts.get(id).cloned())
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Account>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    async fn link_customer(
        &self,
        id: &AccountId,
        customer_id: &str,
    ) -> Result<String, DomainError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(id).ok_or_else(|| not_found(id))?;
        Ok(account.link_customer(customer_id, Timestamp::now()))
    }

    async fn link_connect_account(
        &self,
        id: &AccountId,
        connect_account_id: &str,
    ) -> Result<String, DomainError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(id).ok_or_else(|| not_found(id))?;
        Ok(account.link_connect_account(connect_account_id, Timestamp::now()))
    }

    async fn apply_subscription(
        &self,
        id: &AccountId,
        update: &SubscriptionUpdate,
        event_at: Timestamp,
    ) -> Result<SubscriptionOutcome, DomainError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(id).ok_or_else(|| not_found(id))?;
        Ok(account.apply_subscription(update, event_at, Timestamp::now()))
    }

    async fn grant_credits(
        &self,
        id: &AccountId,
        event_id: &str,
        credits: u64,
    ) -> Result<GrantOutcome, DomainError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        if state.credit_grants.contains(event_id) {
            return Ok(GrantOutcome::AlreadyApplied);
        }
        let account = state.accounts.get_mut(id).ok_or_else(|| not_found(id))?;
        account.add_credits(credits, Timestamp::now())?;
        state.credit_grants.insert(event_id.to_string());
        Ok(GrantOutcome::Applied)
    }

    async fn consume_credits(&self, id: &AccountId, credits: u64) -> Result<u64, DomainError> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let account = state.accounts.get_mut(id).ok_or_else(|| not_found(id))?;
        account.consume_credits(credits, Timestamp::now())?;
        Ok(account.credit_balance)
    }
}
