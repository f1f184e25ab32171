//! OpenBillingPortalHandler - hosted portal for managing an existing customer.

use std::sync::Arc;

use crate::domain::foundation::{AccountId, ErrorCode};
use crate::ports::{AccountStore, PaymentProvider};

use super::get_account::require_account;
use super::BillingError;

#[derive(Debug, Clone)]
pub struct OpenBillingPortalCommand {
    pub account_id: AccountId,
}

pub struct OpenBillingPortalHandler {
    accounts: Arc<dyn AccountStore>,
    payment_provider: Arc<dyn PaymentProvider>,
    return_url: String,
}

impl OpenBillingPortalHandler {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        payment_provider: Arc<dyn PaymentProvider>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            accounts,
            payment_provider,
            return_url: return_url.into(),
        }
    }

    /// Returns the portal URL. Accounts that never checked out have no
    /// customer to manage and get `CUSTOMER_NOT_LINKED`.
    pub async fn handle(&self, cmd: OpenBillingPortalCommand) -> Result<String, BillingError> {
        let account = require_account(self.accounts.as_ref(), &cmd.account_id).await?;
        let customer_id = account.customer_id.ok_or_else(|| {
            BillingError::not_found(
                ErrorCode::CustomerNotLinked,
                "No billing customer linked to this account",
            )
        })?;

        let session = self
            .payment_provider
            .create_portal_session(&customer_id, &self.return_url)
            .await?;
        Ok(session.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAccountStore;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::billing::Account;
    use crate::domain::foundation::Timestamp;

    const RETURN_URL: &str = "https://app.example.com/billing";

    async fn setup(customer: Option<&str>) -> (OpenBillingPortalHandler, MockPaymentProvider) {
        let id = AccountId::new("acc_1").unwrap();
        let store =
            InMemoryAccountStore::with_accounts([Account::register(id.clone(), Timestamp::now())])
                .await;
        if let Some(customer) = customer {
            store.link_customer(&id, customer).await.unwrap();
        }
        let provider = MockPaymentProvider::new();
        let handler =
            OpenBillingPortalHandler::new(Arc::new(store), Arc::new(provider.clone()), RETURN_URL);
        (handler, provider)
    }

    fn command() -> OpenBillingPortalCommand {
        OpenBillingPortalCommand {
            account_id: AccountId::new("acc_1").unwrap(),
        }
    }

    #[tokio::test]
    async fn linked_customer_gets_portal_url() {
        let (handler, provider) = setup(Some("cus_42")).await;

        let url = handler.handle(command()).await.unwrap();

        assert!(url.starts_with("https://billing.stripe.com/"));
        let call = &provider.calls()[0];
        assert_eq!(call.args, vec!["cus_42".to_string(), RETURN_URL.to_string()]);
    }

    #[tokio::test]
    async fn unlinked_customer_is_not_found() {
        let (handler, provider) = setup(None).await;

        let err = handler.handle(command()).await.unwrap_err();

        assert_eq!(err.code(), "CUSTOMER_NOT_LINKED");
        assert!(provider.calls().is_empty());
    }
}
