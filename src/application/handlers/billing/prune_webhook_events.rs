//! PruneWebhookEventsHandler - deletes processed-event records past retention.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::ports::WebhookEventRepository;

use super::BillingError;

pub struct PruneWebhookEventsHandler {
    events: Arc<dyn WebhookEventRepository>,
    retention: Duration,
}

impl PruneWebhookEventsHandler {
    pub fn new(events: Arc<dyn WebhookEventRepository>, retention: Duration) -> Self {
        Self { events, retention }
    }

    /// Deletes records processed before `now - retention`. Returns the count.
    pub async fn handle(&self, now: DateTime<Utc>) -> Result<u64, BillingError> {
        let cutoff = now - self.retention;
        let deleted = self.events.delete_before(cutoff).await?;
        info!(deleted, cutoff = %cutoff, "Pruned webhook event records");
        Ok(deleted)
    }
}
