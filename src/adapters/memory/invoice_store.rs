//! In-memory invoice store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{AccountId, DomainError, ErrorCode, InvoiceId, Timestamp};
use crate::ports::{Invoice, InvoiceStore, MarkPaidOutcome};

#[derive(Debug, Clone, Default)]
pub struct InMemoryInvoiceStore {
    invoices: Arc<RwLock<HashMap<InvoiceId, Invoice>>>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unpaid invoice.
    pub async fn insert_unpaid(&self, id: InvoiceId, account_id: AccountId, amount_cents: u64) {
        let invoice = Invoice {
            id: id.clone(),
            account_id,
            amount_cents,
            paid_at: None,
            paid_amount_cents: None,
        };
        self.invoices.write().await.insert(id, invoice);
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, DomainError> {
        Ok(self.invoices.read().await.get(id).cloned())
    }

    async fn mark_paid(
        &self,
        id: &InvoiceId,
        account_id: &AccountId,
        amount_cents: u64,
        paid_at: Timestamp,
    ) -> Result<MarkPaidOutcome, DomainError> {
        let mut invoices = self.invoices.write().await;
        let invoice = invoices.get_mut(id).ok_or_else(|| {
            DomainError::new(ErrorCode::InvoiceNotFound, format!("Invoice {} not found", id))
        })?;

        if &invoice.account_id != account_id {
            return Err(DomainError::new(
                ErrorCode::InvoiceAccountMismatch,
                format!("Invoice {} belongs to another account", id),
            ));
        }
        if invoice.is_paid() {
            return Ok(MarkPaidOutcome::AlreadyPaid);
        }

        invoice.paid_at = Some(paid_at);
        invoice.paid_amount_cents = Some(amount_cents);
        Ok(MarkPaidOutcome::MarkedPaid)
    }
}
