//! PostgreSQL adapters - Database implementations for the storage ports.
//!
//! - `PostgresAccountStore` - Accounts and keyed credit grants
//! - `PostgresInvoiceStore` - Invoice payment state
//! - `PostgresJobPostStore` - Featured job posts
//! - `PostgresWebhookEventRepository` - Reconciled provider events
//!
//! The schema lives in `migrations/` and is applied at startup.

mod account_store;
mod invoice_store;
mod job_post_store;
mod webhook_event_repository;

pub use account_store::PostgresAccountStore;
pub use invoice_store::PostgresInvoiceStore;
pub use job_post_store::PostgresJobPostStore;
pub use webhook_event_repository::PostgresWebhookEventRepository;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
