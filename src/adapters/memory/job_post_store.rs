//! In-memory job post store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{AccountId, DomainError, ErrorCode, JobPostId, Timestamp};
use crate::ports::{FeatureOutcome, JobPost, JobPostStore};

#[derive(Debug, Clone, Default)]
pub struct InMemoryJobPostStore {
    posts: Arc<RwLock<HashMap<JobPostId, JobPost>>>,
}

impl InMemoryJobPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: JobPostId, account_id: AccountId) {
        let post = JobPost {
            id: id.clone(),
            account_id,
            featured_at: None,
        };
        self.posts.write().await.insert(id, post);
    }
}

#[async_trait]
impl JobPostStore for InMemoryJobPostStore {
    async fn find_by_id(&self, id: &JobPostId) -> Result<Option<JobPost>, DomainError> {
        Ok(self.posts.read().await.get(id).cloned())
    }

    async fn mark_featured(
        &self,
        id: &JobPostId,
        account_id: &AccountId,
        featured_at: Timestamp,
    ) -> Result<FeatureOutcome, DomainError> {
        let mut posts = self.posts.write().await;
        let post = posts.get_mut(id).ok_or_else(|| {
            DomainError::new(ErrorCode::JobPostNotFound, format!("Job post {} not found", id))
        })?;

        if &post.account_id != account_id {
            return Err(DomainError::new(
                ErrorCode::Forbidden,
                format!("Job post {} belongs to another account", id),
            ));
        }
        if post.featured_at.is_some() {
            return Ok(FeatureOutcome::AlreadyFeatured);
        }

        post.featured_at = Some(featured_at);
        Ok(FeatureOutcome::Featured)
    }
}
