//! GetAccountHandler - reads the caller's billing state.

use std::sync::Arc;

use crate::domain::billing::Account;
use crate::domain::foundation::{AccountId, ErrorCode};
use crate::ports::AccountStore;

use super::BillingError;

#[derive(Debug, Clone)]
pub struct GetAccountQuery {
    pub account_id: AccountId,
}

pub struct GetAccountHandler {
    accounts: Arc<dyn AccountStore>,
}

impl GetAccountHandler {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    pub async fn handle(&self, query: GetAccountQuery) -> Result<Account, BillingError> {
        require_account(self.accounts.as_ref(), &query.account_id).await
    }
}

/// Loads an account or fails with `ACCOUNT_NOT_FOUND`.
pub(super) async fn require_account(
    accounts: &dyn AccountStore,
    account_id: &AccountId,
) -> Result<Account, BillingError> {
    accounts.find_by_id(account_id).await?.ok_or_else(|| {
        BillingError::not_found(
            ErrorCode::AccountNotFound,
            format!("Account {} not found", account_id),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAccountStore;
    use crate::domain::foundation::Timestamp;

    #[tokio::test]
    async fn returns_registered_account() {
        let id = AccountId::new("acc_1").unwrap();
        let store =
            InMemoryAccountStore::with_accounts([Account::register(id.clone(), Timestamp::now())])
                .await;
        let handler = GetAccountHandler::new(Arc::new(store));

        let account = handler.handle(GetAccountQuery { account_id: id }).await.unwrap();

        assert_eq!(account.credit_balance, 0);
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let handler = GetAccountHandler::new(Arc::new(InMemoryAccountStore::new()));

        let err = handler
            .handle(GetAccountQuery {
                account_id: AccountId::new("acc_404").unwrap(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), "ACCOUNT_NOT_FOUND");
    }
}
