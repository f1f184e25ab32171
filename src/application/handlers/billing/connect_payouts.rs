//! Connected-account handlers for freelancer payouts.
//!
//! Onboarding creates and links the connected account on first use; the
//! dashboard link is only available once an account is linked.

use std::sync::Arc;

use tracing::info;

use crate::domain::foundation::{AccountId, ErrorCode};
use crate::ports::{AccountStore, PaymentProvider};

use super::get_account::require_account;
use super::BillingError;

#[derive(Debug, Clone)]
pub struct OpenConnectOnboardingCommand {
    pub account_id: AccountId,
    pub email: Option<String>,
}

/// Redirect targets for the hosted onboarding flow.
#[derive(Debug, Clone)]
pub struct ConnectUrls {
    pub refresh_url: String,
    pub return_url: String,
}

pub struct OpenConnectOnboardingHandler {
    accounts: Arc<dyn AccountStore>,
    payment_provider: Arc<dyn PaymentProvider>,
    urls: ConnectUrls,
}

impl OpenConnectOnboardingHandler {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        payment_provider: Arc<dyn PaymentProvider>,
        urls: ConnectUrls,
    ) -> Self {
        Self {
            accounts,
            payment_provider,
            urls,
        }
    }

    pub async fn handle(&self, cmd: OpenConnectOnboardingCommand) -> Result<String, BillingError> {
        let account = require_account(self.accounts.as_ref(), &cmd.account_id).await?;

        let connect_account_id = match account.connect_account_id {
            Some(id) => id,
            None => {
                let created = self
                    .payment_provider
                    .create_connect_account(&cmd.account_id, cmd.email.as_deref())
                    .await?;
                let linked = self
                    .accounts
                    .link_connect_account(&cmd.account_id, &created)
                    .await?;
                info!(
                    account_id = %cmd.account_id,
                    connect_account_id = %linked,
                    "Connected account linked"
                );
                linked
            }
        };

        let url = self
            .payment_provider
            .create_connect_onboarding_link(
                &connect_account_id,
                &self.urls.refresh_url,
                &self.urls.return_url,
            )
            .await?;
        Ok(url)
    }
}

#[derive(Debug, Clone)]
pub struct OpenConnectDashboardCommand {
    pub account_id: AccountId,
}

pub struct OpenConnectDashboardHandler {
    accounts: Arc<dyn AccountStore>,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl OpenConnectDashboardHandler {
    pub fn new(accounts: Arc<dyn AccountStore>, payment_provider: Arc<dyn PaymentProvider>) -> Self {
        Self {
            accounts,
            payment_provider,
        }
    }

    pub async fn handle(&self, cmd: OpenConnectDashboardCommand) -> Result<String, BillingError> {
        let account = require_account(self.accounts.as_ref(), &cmd.account_id).await?;
        let connect_account_id = account.connect_account_id.ok_or_else(|| {
            BillingError::not_found(
                ErrorCode::ConnectAccountNotLinked,
                "No payout account linked to this account",
            )
        })?;

        let url = self
            .payment_provider
            .create_connect_dashboard_link(&connect_account_id)
            .await?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAccountStore;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::billing::Account;
    use crate::domain::foundation::Timestamp;

    fn acc() -> AccountId {
        AccountId::new("acc_1").unwrap()
    }

    async fn store() -> InMemoryAccountStore {
        InMemoryAccountStore::with_accounts([Account::register(acc(), Timestamp::now())]).await
    }

    fn urls() -> ConnectUrls {
        ConnectUrls {
            refresh_url: "https://app.example.com/payouts/refresh".to_string(),
            return_url: "https://app.example.com/payouts".to_string(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Onboarding
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn onboarding_creates_and_links_account_once() {
        let store = store().await;
        let provider = MockPaymentProvider::new();
        let handler = OpenConnectOnboardingHandler::new(
            Arc::new(store.clone()),
            Arc::new(provider.clone()),
            urls(),
        );
        let cmd = OpenConnectOnboardingCommand {
            account_id: acc(),
            email: None,
        };

        let first = handler.handle(cmd.clone()).await.unwrap();
        let second = handler.handle(cmd).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.call_count("create_connect_account"), 1);
        let account = store.find_by_id(&acc()).await.unwrap().unwrap();
        assert!(first.ends_with(&account.connect_account_id.unwrap()));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Dashboard
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn dashboard_requires_linked_account() {
        let handler =
            OpenConnectDashboardHandler::new(Arc::new(store().await), Arc::new(MockPaymentProvider::new()));

        let err = handler
            .handle(OpenConnectDashboardCommand { account_id: acc() })
            .await
            .unwrap_err();

        assert_eq!(err.code(), "CONNECT_ACCOUNT_NOT_LINKED");
    }

    #[tokio::test]
    async fn dashboard_link_for_linked_account() {
        let store = store().await;
        store.link_connect_account(&acc(), "acct_9").await.unwrap();
        let handler =
            OpenConnectDashboardHandler::new(Arc::new(store), Arc::new(MockPaymentProvider::new()));

        let url = handler
            .handle(OpenConnectDashboardCommand { account_id: acc() })
            .await
            .unwrap();

        assert_eq!(url, "https://connect.stripe.com/express/acct_9");
    }
}
