//! RegisterAccountHandler - creates the billing record for a new account.

use std::sync::Arc;

use tracing::info;

use crate::domain::billing::Account;
use crate::domain::foundation::{AccountId, ErrorCode, Timestamp};
use crate::ports::AccountStore;

use super::get_account::require_account;
use super::BillingError;

#[derive(Debug, Clone)]
pub struct RegisterAccountCommand {
    pub account_id: AccountId,
}

#[derive(Debug, Clone)]
pub struct RegisterAccountResult {
    pub account: Account,
    /// False when the account already existed.
    pub created: bool,
}

/// Registration is idempotent: repeating it returns the existing account.
pub struct RegisterAccountHandler {
    accounts: Arc<dyn AccountStore>,
}

impl RegisterAccountHandler {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    pub async fn handle(
        &self,
        cmd: RegisterAccountCommand,
    ) -> Result<RegisterAccountResult, BillingError> {
        let account = Account::register(cmd.account_id.clone(), Timestamp::now());

        match self.accounts.create(&account).await {
            Ok(()) => {
                info!(account_id = %cmd.account_id, "Account registered");
                Ok(RegisterAccountResult {
                    account,
                    created: true,
                })
            }
            Err(e) if e.code == ErrorCode::AccountAlreadyExists => {
                let account = require_account(self.accounts.as_ref(), &cmd.account_id).await?;
                Ok(RegisterAccountResult {
                    account,
                    created: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
