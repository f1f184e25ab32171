//! PostgreSQL implementation of AccountStore.
//!
//! Subscription statements run in a transaction that locks the account row,
//! so the event-time fence is checked and advanced atomically. Credit grants
//! are one statement: the insert into `credit_grants` (PRIMARY KEY on
//! event_id) feeds the balance increment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::billing::{Account, PlanTier, SubscriptionOutcome, SubscriptionUpdate};
use crate::domain::foundation::{AccountId, DomainError, ErrorCode, Timestamp};
use crate::ports::{AccountStore, GrantOutcome};

const ACCOUNT_COLUMNS: &str = "id, plan_tier, credit_balance, customer_id, connect_account_id, \
     subscription_id, subscription_period_end, subscription_fenced_at, created_at, updated_at";

/// PostgreSQL implementation of the AccountStore port.
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_account(
        tx: &mut Transaction<'_, Postgres>,
        id: &AccountId,
    ) -> Result<Account, DomainError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE id = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to lock account: {}", e)))?;

        row.ok_or_else(|| not_found(id))?.try_into()
    }

    async fn exists(&self, id: &AccountId) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to check account: {}", e)))
    }

    async fn link_column(
        &self,
        column: &'static str,
        id: &AccountId,
        value: &str,
    ) -> Result<String, DomainError> {
        // COALESCE keeps the first linked value
        let linked: Option<Option<String>> = sqlx::query_scalar(&format!(
            r#"
            UPDATE accounts SET
                {column} = COALESCE({column}, $2),
                updated_at = CASE WHEN {column} IS NULL THEN NOW() ELSE updated_at END
            WHERE id = $1
            RETURNING {column}
            "#,
            column = column
        ))
        .bind(id.as_str())
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to link {}: {}", column, e)))?;

        linked
            .flatten()
            .ok_or_else(|| not_found(id))
    }
}

/// Database row representation of an account.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: String,
    plan_tier: String,
    credit_balance: i64,
    customer_id: Option<String>,
    connect_account_id: Option<String>,
    subscription_id: Option<String>,
    subscription_period_end: Option<DateTime<Utc>>,
    subscription_fenced_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = DomainError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: AccountId::new(row.id)
                .map_err(|e| DomainError::database(format!("Invalid account id: {}", e)))?,
            plan_tier: row
                .plan_tier
                .parse::<PlanTier>()
                .map_err(|e| DomainError::database(format!("Invalid plan tier: {}", e)))?,
            credit_balance: u64::try_from(row.credit_balance)
                .map_err(|_| DomainError::database("Negative credit balance"))?,
            customer_id: row.customer_id,
            connect_account_id: row.connect_account_id,
            subscription_id: row.subscription_id,
            subscription_period_end: row.subscription_period_end.map(Timestamp::from_datetime),
            subscription_fenced_at: row.subscription_fenced_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn not_found(id: &AccountId) -> DomainError {
    DomainError::new(ErrorCode::AccountNotFound, format!("Account {} not found", id))
}

fn to_db_amount(credits: u64) -> Result<i64, DomainError> {
    i64::try_from(credits).map_err(|_| {
        DomainError::new(ErrorCode::OutOfRange, format!("Credit amount {} too large", credits))
    })
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn create(&self, account: &Account) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, plan_tier, credit_balance, customer_id, connect_account_id,
                subscription_id, subscription_period_end, subscription_fenced_at,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(account.id.as_str())
        .bind(account.plan_tier.as_str())
        .bind(to_db_amount(account.credit_balance)?)
        .bind(&account.customer_id)
        .bind(&account.connect_account_id)
        .bind(&account.subscription_id)
        .bind(account.subscription_period_end.map(|t| *t.as_datetime()))
        .bind(account.subscription_fenced_at.map(|t| *t.as_datetime()))
        .bind(account.created_at.as_datetime())
        .bind(account.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("accounts_pkey") {
                    return DomainError::new(
                        ErrorCode::AccountAlreadyExists,
                        format!("Account {} already exists", account.id),
                    );
                }
            }
            DomainError::database(format!("Failed to create account: {}", e))
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, DomainError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find account: {}", e)))?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Account>, DomainError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE subscription_id = $1 LIMIT 1",
            ACCOUNT_COLUMNS
        ))
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find account: {}", e)))?;

        row.map(Account::try_from).transpose()
    }

    async fn link_customer(
        &self,
        id: &AccountId,
        customer_id: &str,
    ) -> Result<String, DomainError> {
        self.link_column("customer_id", id, customer_id).await
    }

    async fn link_connect_account(
        &self,
        id: &AccountId,
        connect_account_id: &str,
    ) -> Result<String, DomainError> {
        self.link_column("connect_account_id", id, connect_account_id)
            .await
    }

    async fn apply_subscription(
        &self,
        id: &AccountId,
        update: &SubscriptionUpdate,
        event_at: Timestamp,
    ) -> Result<SubscriptionOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to begin transaction: {}", e)))?;

        let mut account = Self::lock_account(&mut tx, id).await?;
        let outcome = account.apply_subscription(update, event_at, Timestamp::now());

        if outcome == SubscriptionOutcome::Applied {
            sqlx::query(
                r#"
                UPDATE accounts SET
                    plan_tier = $2,
                    subscription_id = $3,
                    subscription_period_end = $4,
                    subscription_fenced_at = $5,
                    updated_at = $6
                WHERE id = $1
                "#,
            )
            .bind(id.as_str())
            .bind(account.plan_tier.as_str())
            .bind(&account.subscription_id)
            .bind(account.subscription_period_end.map(|t| *t.as_datetime()))
            .bind(account.subscription_fenced_at.map(|t| *t.as_datetime()))
            .bind(account.updated_at.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to update subscription: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit: {}", e)))?;

        Ok(outcome)
    }

    async fn grant_credits(
        &self,
        id: &AccountId,
        event_id: &str,
        credits: u64,
    ) -> Result<GrantOutcome, DomainError> {
        let amount = to_db_amount(credits)?;

        // The grant row and the increment commit together or not at all; a
        // concurrent insert of the same event id waits on the primary key and
        // then does nothing.
        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            WITH granted AS (
                INSERT INTO credit_grants (event_id, account_id, credits, granted_at)
                SELECT $2, id, $3, NOW() FROM accounts WHERE id = $1
                ON CONFLICT (event_id) DO NOTHING
                RETURNING account_id
            )
            UPDATE accounts SET
                credit_balance = credit_balance + $3,
                updated_at = NOW()
            WHERE id IN (SELECT account_id FROM granted)
            RETURNING credit_balance
            "#,
        )
        .bind(id.as_str())
        .bind(event_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to grant credits: {}", e)))?;

        match balance {
            Some(_) => Ok(GrantOutcome::Applied),
            None if self.exists(id).await? => Ok(GrantOutcome::AlreadyApplied),
            None => Err(not_found(id)),
        }
    }

    async fn consume_credits(&self, id: &AccountId, credits: u64) -> Result<u64, DomainError> {
        let amount = to_db_amount(credits)?;
        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE accounts SET
                credit_balance = credit_balance - $2,
                updated_at = NOW()
            WHERE id = $1 AND credit_balance >= $2
            RETURNING credit_balance
            "#,
        )
        .bind(id.as_str())
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to consume credits: {}", e)))?;

        match balance {
            Some(balance) => u64::try_from(balance)
                .map_err(|_| DomainError::database("Negative credit balance")),
            None if self.exists(id).await? => Err(DomainError::new(
                ErrorCode::InsufficientCredits,
                format!("Cannot consume {} credits", credits),
            )),
            None => Err(not_found(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> AccountRow {
        let now = Utc::now();
        AccountRow {
            id: "acc_1".to_string(),
            plan_tier: "teams".to_string(),
            credit_balance: 250,
            customer_id: Some("cus_1".to_string()),
            connect_account_id: None,
            subscription_id: Some("sub_9".to_string()),
            subscription_period_end: Some(now),
            subscription_fenced_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_converts_to_account() {
        let account = Account::try_from(row()).unwrap();

        assert_eq!(account.id.as_str(), "acc_1");
        assert_eq!(account.plan_tier, PlanTier::Teams);
        assert_eq!(account.credit_balance, 250);
        assert_eq!(account.subscription_id.as_deref(), Some("sub_9"));
    }

    #[test]
    fn unknown_tier_is_database_error() {
        let mut bad = row();
        bad.plan_tier = "platinum".to_string();

        let err = Account::try_from(bad).unwrap_err();

        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn negative_balance_is_rejected() {
        let mut bad = row();
        bad.credit_balance = -1;

        assert!(Account::try_from(bad).is_err());
    }

    #[test]
    fn oversized_amount_is_out_of_range() {
        let err = to_db_amount(u64::MAX).unwrap_err();
        assert_eq!(err.code, ErrorCode::OutOfRange);
    }
}
