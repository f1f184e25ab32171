//! Webhook record retention

use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Processed-event records older than this are pruned
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Interval between prune runs, in hours
    #[serde(default = "default_prune_interval_hours")]
    pub prune_interval_hours: u64,
}

impl WebhookConfig {
    /// Cutoff before which records may be deleted.
    pub fn retention_cutoff(&self, now: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::Utc> {
        now - chrono::Duration::days(i64::from(self.retention_days))
    }

    pub fn prune_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.prune_interval_hours * 3600)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        // Redelivery can span three days; shorter retention would let a
        // late duplicate be reprocessed.
        if self.retention_days < 3 {
            return Err(ValidationError::RetentionTooShort);
        }
        if self.prune_interval_hours == 0 {
            return Err(ValidationError::InvalidPruneInterval);
        }
        Ok(())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            prune_interval_hours: default_prune_interval_hours(),
        }
    }
}

fn default_retention_days() -> u32 {
    30
}

fn default_prune_interval_hours() -> u64 {
    24
}
