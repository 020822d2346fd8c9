//! Execution repository - the campaign work queue

use crate::db::DatabasePool;
use crate::models::{CampaignExecution, CreateExecution};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nurture_common::types::ExecutionId;
use nurture_common::{Error, Result};
use uuid::Uuid;

/// Execution repository contract
///
/// `pending -> resolved` is the sole at-most-once transition in the engine;
/// every mark method is a conditional update guarded on `status = 'pending'`
/// and reports whether the row actually changed.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn create(&self, input: CreateExecution) -> Result<CampaignExecution>;
    async fn get(&self, id: ExecutionId) -> Result<Option<CampaignExecution>>;
    /// Pending executions due at or before `now`, oldest first
    async fn due_batch(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<CampaignExecution>>;
    async fn mark_sent(
        &self,
        id: ExecutionId,
        at: DateTime<Utc>,
        external_message_id: Option<&str>,
    ) -> Result<bool>;
    async fn mark_failed(&self, id: ExecutionId, at: DateTime<Utc>, error: &str) -> Result<bool>;
    async fn mark_skipped(&self, id: ExecutionId, at: DateTime<Utc>, reason: &str)
        -> Result<bool>;
}

/// Database execution repository
pub struct DbExecutionRepository {
    pool: DatabasePool,
}

impl DbExecutionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionRepository for DbExecutionRepository {
    async fn create(&self, input: CreateExecution) -> Result<CampaignExecution> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query_as::<_, CampaignExecution>(
            r#"
            INSERT INTO campaign_executions (
                id, enrollment_id, step_id, scheduled_for, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, 'pending', $5, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.enrollment_id)
        .bind(input.step_id)
        .bind(input.scheduled_for)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: ExecutionId) -> Result<Option<CampaignExecution>> {
        sqlx::query_as::<_, CampaignExecution>(
            "SELECT * FROM campaign_executions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn due_batch(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<CampaignExecution>> {
        sqlx::query_as::<_, CampaignExecution>(
            r#"
            SELECT * FROM campaign_executions
            WHERE status = 'pending' AND scheduled_for <= $1
            ORDER BY scheduled_for ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn mark_sent(
        &self,
        id: ExecutionId,
        at: DateTime<Utc>,
        external_message_id: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_executions SET
                status = 'sent',
                executed_at = $2,
                external_message_id = $3,
                updated_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(external_message_id)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: ExecutionId, at: DateTime<Utc>, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_executions SET
                status = 'failed',
                executed_at = $2,
                error_message = $3,
                updated_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(error)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_skipped(
        &self,
        id: ExecutionId,
        at: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_executions SET
                status = 'skipped',
                executed_at = $2,
                error_message = $3,
                updated_at = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(reason)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
