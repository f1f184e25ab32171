//! PostgreSQL implementation of InvoiceStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{AccountId, DomainError, ErrorCode, InvoiceId, Timestamp};
use crate::ports::{Invoice, InvoiceStore, MarkPaidOutcome};

pub struct PostgresInvoiceStore {
    pool: PgPool,
}

impl PostgresInvoiceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    account_id: String,
    amount_cents: i64,
    paid_at: Option<DateTime<Utc>>,
    paid_amount_cents: Option<i64>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DomainError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let cents = |v: i64| {
            u64::try_from(v).map_err(|_| DomainError::database("Negative invoice amount"))
        };
        Ok(Invoice {
            id: InvoiceId::new(row.id)
                .map_err(|e| DomainError::database(format!("Invalid invoice id: {}", e)))?,
            account_id: AccountId::new(row.account_id)
                .map_err(|e| DomainError::database(format!("Invalid account id: {}", e)))?,
            amount_cents: cents(row.amount_cents)?,
            paid_at: row.paid_at.map(Timestamp::from_datetime),
            paid_amount_cents: row.paid_amount_cents.map(cents).transpose()?,
        })
    }
}

#[async_trait]
impl InvoiceStore for PostgresInvoiceStore {
    async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, DomainError> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, amount_cents, paid_at, paid_amount_cents
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find invoice: {}", e)))?;

        row.map(Invoice::try_from).transpose()
    }

    async fn mark_paid(
        &self,
        id: &InvoiceId,
        account_id: &AccountId,
        amount_cents: u64,
        paid_at: Timestamp,
    ) -> Result<MarkPaidOutcome, DomainError> {
        let amount = i64::try_from(amount_cents).map_err(|_| {
            DomainError::new(ErrorCode::OutOfRange, "Invoice amount too large")
        })?;

        // paid_at IS NULL keeps the first payment timestamp
        let updated = sqlx::query(
            r#"
            UPDATE invoices SET paid_at = $3, paid_amount_cents = $4
            WHERE id = $1 AND account_id = $2 AND paid_at IS NULL
            "#,
        )
        .bind(id.as_str())
        .bind(account_id.as_str())
        .bind(paid_at.as_datetime())
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to mark invoice paid: {}", e)))?
        .rows_affected();

        if updated == 1 {
            return Ok(MarkPaidOutcome::MarkedPaid);
        }

        match self.find_by_id(id).await? {
            None => Err(DomainError::new(
                ErrorCode::InvoiceNotFound,
                format!("Invoice {} not found", id),
            )),
            Some(invoice) if &invoice.account_id != account_id => Err(DomainError::new(
                ErrorCode::InvoiceAccountMismatch,
                format!("Invoice {} belongs to another account", id),
            )),
            Some(_) => Ok(MarkPaidOutcome::AlreadyPaid),
        }
    }
}
