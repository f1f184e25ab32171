//! In-Memory Store Adapters
//!
//! Implementations of the storage ports backed by process memory.
//! Used by tests and by local runs without a database.
//!
//! Each store keeps all of its state behind one lock, so every port operation
//! is a single critical section and as atomic as its PostgreSQL counterpart.

mod account_store;
mod invoice_store;
mod job_post_store;
mod webhook_event_repository;

pub use account_store::InMemoryAccountStore;
pub use invoice_store::InMemoryInvoiceStore;
pub use job_post_store::InMemoryJobPostStore;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
