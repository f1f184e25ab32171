//! InvoiceStore port - Payment state of client invoices.
//!
//! Invoices are created and edited by the host application; the billing flow
//! only reads them and records payment.

use async_trait::async_trait;

use crate::domain::foundation::{AccountId, DomainError, InvoiceId, Timestamp};

/// Payment-relevant view of an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: InvoiceId,
    pub account_id: AccountId,
    pub amount_cents: u64,
    pub paid_at: Option<Timestamp>,
    pub paid_amount_cents: Option<u64>,
}

impl Invoice {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }
}

/// Result of marking an invoice paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkPaidOutcome {
    MarkedPaid,
    /// Already paid; the original payment timestamp is kept.
    AlreadyPaid,
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, DomainError>;

    /// Set the payment timestamp if it is not set yet.
    ///
    /// # Errors
    ///
    /// - `InvoiceNotFound` if no such invoice exists
    /// - `InvoiceAccountMismatch` if it belongs to another account
    async fn mark_paid(
        &self,
        id: &InvoiceId,
        account_id: &AccountId,
        amount_cents: u64,
        paid_at: Timestamp,
    ) -> Result<MarkPaidOutcome, DomainError>;
}
