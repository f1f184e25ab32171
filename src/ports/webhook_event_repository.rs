//! WebhookEventRepository port - Record of reconciled provider events.
//!
//! A record exists only for events whose outcome is final (applied or
//! deliberately ignored). Failed attempts leave no record, so the provider's
//! redelivery re-runs them.
//!
//! The provider may deliver the same event multiple times due to:
//! - Network timeouts
//! - A 5xx response from our endpoint
//! - Our 2xx response being lost on the way back

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;

/// Record of a reconciled webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEventRecord {
    /// Provider event ID (evt_xxx format).
    pub event_id: String,

    /// Type of provider event (e.g., "checkout.session.completed").
    pub event_type: String,

    pub processed_at: DateTime<Utc>,

    /// Result of processing: "success" or "ignored".
    pub result: String,

    /// Reconciliation intent that was derived, e.g. "add_credits".
    pub intent: String,

    /// Why the event was ignored, if it was.
    pub note: Option<String>,

    /// Original event payload for debugging.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    /// Creates a record for an applied event.
    pub fn success(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        intent: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            result: "success".to_string(),
            intent: intent.into(),
            note: None,
            payload,
        }
    }

    /// Creates a record for an acknowledged event that changed nothing.
    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        intent: impl Into<String>,
        reason: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            result: "ignored".to_string(),
            intent: intent.into(),
            note: Some(reason.into()),
            payload,
        }
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this event).
    Inserted,
    /// Record already exists (duplicate event).
    AlreadyExists,
}

/// Port for storing and retrieving reconciled webhook events.
///
/// Implementations should use database constraints (PRIMARY KEY on event_id)
/// to prevent race conditions during concurrent webhook processing.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Find a previously reconciled event by its provider event ID.
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Insert a record unless one exists for the same event id.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Delete records processed before `timestamp`, returning how many went.
    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError>;
}

/// Result of webhook processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookResult {
    /// The event's intent was applied.
    Processed,
    /// The event was acknowledged without changing state.
    Ignored,
    /// Event was already reconciled by an earlier delivery.
    AlreadyProcessed,
}
