//! JobPostStore port - Featured placement of job posts.

use async_trait::async_trait;

use crate::domain::foundation::{AccountId, DomainError, JobPostId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPost {
    pub id: JobPostId,
    pub account_id: AccountId,
    pub featured_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureOutcome {
    Featured,
    AlreadyFeatured,
}

#[async_trait]
pub trait JobPostStore: Send + Sync {
    async fn find_by_id(&self, id: &JobPostId) -> Result<Option<JobPost>, DomainError>;

    /// Mark the post featured if it is not already.
    ///
    /// # Errors
    ///
    /// - `JobPostNotFound` if no such post exists
    /// - `Forbidden` if it belongs to another account
    async fn mark_featured(
        &self,
        id: &JobPostId,
        account_id: &AccountId,
        featured_at: Timestamp,
    ) -> Result<FeatureOutcome, DomainError>;
}
