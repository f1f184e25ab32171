//! PostgreSQL implementation of JobPostStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{AccountId, DomainError, ErrorCode, JobPostId, Timestamp};
use crate::ports::{FeatureOutcome, JobPost, JobPostStore};

pub struct PostgresJobPostStore {
    pool: PgPool,
}

impl PostgresJobPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobPostRow {
    id: String,
    account_id: String,
    featured_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobPostRow> for JobPost {
    type Error = DomainError;

    fn try_from(row: JobPostRow) -> Result<Self, Self::Error> {
        Ok(JobPost {
            id: JobPostId::new(row.id)
                .map_err(|e| DomainError::database(format!("Invalid job post id: {}", e)))?,
            account_id: AccountId::new(row.account_id)
                .map_err(|e| DomainError::database(format!("Invalid account id: {}", e)))?,
            featured_at: row.featured_at.map(Timestamp::from_datetime),
        })
    }
}

#[async_trait]
impl JobPostStore for PostgresJobPostStore {
    async fn find_by_id(&self, id: &JobPostId) -> Result<Option<JobPost>, DomainError> {
        let row: Option<JobPostRow> =
            sqlx::query_as("SELECT id, account_id, featured_at FROM job_posts WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database(format!("Failed to find job post: {}", e)))?;

        row.map(JobPost::try_from).transpose()
    }

    async fn mark_featured(
        &self,
        id: &JobPostId,
        account_id: &AccountId,
        featured_at: Timestamp,
    ) -> Result<FeatureOutcome, DomainError> {
        let updated = sqlx::query(
            r#"
            UPDATE job_posts SET featured_at = $3
            WHERE id = $1 AND account_id = $2 AND featured_at IS NULL
            "#,
        )
        .bind(id.as_str())
        .bind(account_id.as_str())
        .bind(featured_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to feature job post: {}", e)))?
        .rows_affected();

        if updated == 1 {
            return Ok(FeatureOutcome::Featured);
        }

        match self.find_by_id(id).await? {
            None => Err(DomainError::new(
                ErrorCode::JobPostNotFound,
                format!("Job post {} not found", id),
            )),
            Some(post) if &post.account_id != account_id => Err(DomainError::new(
                ErrorCode::Forbidden,
                format!("Job post {} belongs to another account", id),
            )),
            Some(_) => Ok(FeatureOutcome::AlreadyFeatured),
        }
    }
}
