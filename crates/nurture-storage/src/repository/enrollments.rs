//! Enrollment repository

use crate::db::DatabasePool;
use crate::models::{CampaignEnrollment, CreateEnrollment};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nurture_common::types::{CampaignId, EnrollmentId, LeadId};
use nurture_common::{Error, Result};
use uuid::Uuid;

/// Enrollment repository contract
///
/// The mark/advance methods are conditional updates guarded on
/// `status = 'active'` and return whether a row actually changed, so a
/// resolved enrollment can never be resolved twice.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    async fn create(&self, input: CreateEnrollment) -> Result<CampaignEnrollment>;
    async fn get(&self, id: EnrollmentId) -> Result<Option<CampaignEnrollment>>;
    async fn find_active(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> Result<Option<CampaignEnrollment>>;
    async fn mark_completed(&self, id: EnrollmentId, at: DateTime<Utc>) -> Result<bool>;
    async fn mark_stopped(
        &self,
        id: EnrollmentId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;
    /// Advance `current_step`; only ever moves forward
    async fn advance_step(&self, id: EnrollmentId, step_number: i32) -> Result<bool>;
}

/// Database enrollment repository
pub struct DbEnrollmentRepository {
    pool: DatabasePool,
}

impl DbEnrollmentRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrollmentRepository for DbEnrollmentRepository {
    async fn create(&self, input: CreateEnrollment) -> Result<CampaignEnrollment> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query_as::<_, CampaignEnrollment>(
            r#"
            INSERT INTO campaign_enrollments (
                id, campaign_id, lead_id, status, current_step, created_at, updated_at
            )
            VALUES ($1, $2, $3, 'active', 0, $4, $4)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.campaign_id)
        .bind(input.lead_id)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: EnrollmentId) -> Result<Option<CampaignEnrollment>> {
        sqlx::query_as::<_, CampaignEnrollment>(
            "SELECT * FROM campaign_enrollments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn find_active(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> Result<Option<CampaignEnrollment>> {
        sqlx::query_as::<_, CampaignEnrollment>(
            r#"
            SELECT * FROM campaign_enrollments
            WHERE campaign_id = $1 AND lead_id = $2 AND status = 'active'
            "#,
        )
        .bind(campaign_id)
        .bind(lead_id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn mark_completed(&self, id: EnrollmentId, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_enrollments SET
                status = 'completed',
                completed_at = $2,
                updated_at = $2
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_stopped(
        &self,
        id: EnrollmentId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_enrollments SET
                status = 'stopped',
                stopped_reason = $2,
                stopped_at = $3,
                updated_at = $3
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(at)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn advance_step(&self, id: EnrollmentId, step_number: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_enrollments SET
                current_step = $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'active' AND current_step < $2
            "#,
        )
        .bind(id)
        .bind(step_number)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
