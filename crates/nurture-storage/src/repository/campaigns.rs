//! Campaign and step repository

use crate::db::DatabasePool;
use crate::models::{Campaign, CampaignStep, CreateCampaign, CreateCampaignStep};
use async_trait::async_trait;
use nurture_common::types::{CampaignId, StepId};
use nurture_common::{Error, Result};
use uuid::Uuid;

/// Campaign repository contract
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn create(&self, input: CreateCampaign) -> Result<Campaign>;
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>>;
    async fn add_step(&self, input: CreateCampaignStep) -> Result<CampaignStep>;
    async fn get_step(&self, campaign_id: CampaignId, step_number: i32)
        -> Result<Option<CampaignStep>>;
    async fn get_step_by_id(&self, id: StepId) -> Result<Option<CampaignStep>>;
    /// Highest step number for a campaign, 0 when it has no steps
    async fn max_step_number(&self, campaign_id: CampaignId) -> Result<i32>;
}

/// Database campaign repository
pub struct DbCampaignRepository {
    pool: DatabasePool,
}

impl DbCampaignRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for DbCampaignRepository {
    async fn create(&self, input: CreateCampaign) -> Result<Campaign> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (id, tenant_id, name, description, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.tenant_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn add_step(&self, input: CreateCampaignStep) -> Result<CampaignStep> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        let conditions = input.conditions.unwrap_or_else(|| serde_json::json!({}));

        sqlx::query_as::<_, CampaignStep>(
            r#"
            INSERT INTO campaign_steps (
                id, campaign_id, step_number, channel, message_template,
                subject_template, conditions, delay_days, delay_hours, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.campaign_id)
        .bind(input.step_number)
        .bind(&input.channel)
        .bind(&input.message_template)
        .bind(&input.subject_template)
        .bind(&conditions)
        .bind(input.delay_days)
        .bind(input.delay_hours)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get_step(
        &self,
        campaign_id: CampaignId,
        step_number: i32,
    ) -> Result<Option<CampaignStep>> {
        sqlx::query_as::<_, CampaignStep>(
            "SELECT * FROM campaign_steps WHERE campaign_id = $1 AND step_number = $2",
        )
        .bind(campaign_id)
        .bind(step_number)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get_step_by_id(&self, id: StepId) -> Result<Option<CampaignStep>> {
        sqlx::query_as::<_, CampaignStep>("SELECT * FROM campaign_steps WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn max_step_number(&self, campaign_id: CampaignId) -> Result<i32> {
        let row: (Option<i32>,) = sqlx::query_as(
            "SELECT MAX(step_number) FROM campaign_steps WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.0.unwrap_or(0))
    }
}
