//! DowngradePlanHandler - user-initiated return to the free plan.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::billing::{Account, SubscriptionOutcome, SubscriptionUpdate};
use crate::domain::foundation::{AccountId, Timestamp};
use crate::ports::{AccountStore, PaymentErrorCode, PaymentProvider};

use super::get_account::require_account;
use super::BillingError;

#[derive(Debug, Clone)]
pub struct DowngradePlanCommand {
    pub account_id: AccountId,
}

/// Cancels the provider subscription immediately, then clears it locally.
///
/// The provider's later `customer.subscription.deleted` event names a
/// subscription that is no longer linked, so the reconciler ignores it.
pub struct DowngradePlanHandler {
    accounts: Arc<dyn AccountStore>,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl DowngradePlanHandler {
    pub fn new(accounts: Arc<dyn AccountStore>, payment_provider: Arc<dyn PaymentProvider>) -> Self {
        Self {
            accounts,
            payment_provider,
        }
    }

    pub async fn handle(&self, cmd: DowngradePlanCommand) -> Result<Account, BillingError> {
        let account = require_account(self.accounts.as_ref(), &cmd.account_id).await?;

        if let Some(subscription_id) = &account.subscription_id {
            match self.payment_provider.cancel_subscription(subscription_id).await {
                Ok(()) => {}
                // Already gone on the provider side
                Err(e) if e.code == PaymentErrorCode::NotFound => {
                    warn!(
                        account_id = %cmd.account_id,
                        subscription_id = %subscription_id,
                        "Subscription already absent at provider"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        let outcome = self
            .accounts
            .apply_subscription(&cmd.account_id, &SubscriptionUpdate::Downgrade, Timestamp::now())
            .await?;
        if outcome != SubscriptionOutcome::Applied {
            warn!(account_id = %cmd.account_id, outcome = ?outcome, "Downgrade not applied");
        } else {
            info!(account_id = %cmd.account_id, from = %account.plan_tier, "Plan downgraded");
        }

        require_account(self.accounts.as_ref(), &cmd.account_id).await
    }
}
