//! ConsumeCreditsHandler - spends credits from the caller's balance.

use std::sync::Arc;

use tracing::info;

use crate::domain::billing::Account;
use crate::domain::foundation::{AccountId, ValidationError};
use crate::ports::AccountStore;

use super::get_account::require_account;
use super::BillingError;

#[derive(Debug, Clone)]
pub struct ConsumeCreditsCommand {
    pub account_id: AccountId,
    pub credits: u64,
}

pub struct ConsumeCreditsHandler {
    accounts: Arc<dyn AccountStore>,
}

impl ConsumeCreditsHandler {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Fails with `InsufficientCredits` rather than letting the balance go negative.
    pub async fn handle(&self, cmd: ConsumeCreditsCommand) -> Result<Account, BillingError> {
        if cmd.credits == 0 {
            return Err(ValidationError::out_of_range("credits", 1, i64::MAX, 0).into());
        }

        let balance = self
            .accounts
            .consume_credits(&cmd.account_id, cmd.credits)
            .await?;
        info!(account_id = %cmd.account_id, credits = cmd.credits, balance, "Credits consumed");

        require_account(self.accounts.as_ref(), &cmd.account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAccountStore;
    use crate::domain::foundation::Timestamp;

    async fn store_with_balance(credits: u64) -> InMemoryAccountStore {
        let id = AccountId::new("acc_1").unwrap();
        let store =
            InMemoryAccountStore::with_accounts([Account::register(id.clone(), Timestamp::now())])
                .await;
        store.grant_credits(&id, "evt_seed", credits).await.unwrap();
        store
    }

    fn command(credits: u64) -> ConsumeCreditsCommand {
        ConsumeCreditsCommand {
            account_id: AccountId::new("acc_1").unwrap(),
            credits,
        }
    }

    #[tokio::test]
    async fn consumes_from_balance() {
        let handler = ConsumeCreditsHandler::new(Arc::new(store_with_balance(50).await));
        let account = handler.handle(command(20)).await.unwrap();
        assert_eq!(account.credit_balance, 30);
    }

    #[tokio::test]
    async fn overdraw_is_rejected_and_balance_kept() {
        let store = store_with_balance(10).await;
        let handler = ConsumeCreditsHandler::new(Arc::new(store.clone()));

        let err = handler.handle(command(11)).await.unwrap_err();

        assert!(matches!(err, BillingError::InsufficientCredits(_)));
        let account = store
            .find_by_id(&AccountId::new("acc_1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.credit_balance, 10);
    }

    #[tokio::test]
    async fn zero_credits_is_validation_error() {
        let handler = ConsumeCreditsHandler::new(Arc::new(store_with_balance(10).await));
        let err = handler.handle(command(0)).await.unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }
}
