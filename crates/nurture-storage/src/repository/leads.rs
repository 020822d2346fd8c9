//! Lead repository - read/write contract against the CRM's lead store

use crate::db::DatabasePool;
use crate::models::{Lead, LearnedProfile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nurture_common::types::LeadId;
use nurture_common::{Error, Result};

/// Lead repository contract
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn get(&self, id: LeadId) -> Result<Option<Lead>>;
    /// Leads never analyzed, or last analyzed before `cutoff`
    async fn list_stale(&self, cutoff: DateTime<Utc>, limit: i64) -> Result<Vec<Lead>>;
    /// Persist a learned profile and stamp the analysis time
    async fn save_profile(
        &self,
        id: LeadId,
        profile: &LearnedProfile,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()>;
    /// Stamp the analysis time without touching learned fields
    async fn mark_analyzed(&self, id: LeadId, analyzed_at: DateTime<Utc>) -> Result<()>;
}

/// Database lead repository
pub struct DbLeadRepository {
    pool: DatabasePool,
}

impl DbLeadRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadRepository for DbLeadRepository {
    async fn get(&self, id: LeadId) -> Result<Option<Lead>> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>, limit: i64) -> Result<Vec<Lead>> {
        sqlx::query_as::<_, Lead>(
            r#"
            SELECT * FROM leads
            WHERE last_pattern_analysis IS NULL OR last_pattern_analysis < $1
            ORDER BY last_pattern_analysis ASC NULLS FIRST
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn save_profile(
        &self,
        id: LeadId,
        profile: &LearnedProfile,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        let best_days = serde_json::to_value(&profile.best_days)
            .map_err(|e| Error::Internal(e.to_string()))?;
        let best_times = serde_json::to_value(&profile.best_times)
            .map_err(|e| Error::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE leads SET
                learned_best_days = $2,
                learned_best_times = $3,
                learned_optimal_gap_hours = $4,
                learned_channel_preference = $5,
                learning_confidence = $6,
                last_pattern_analysis = $7,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&best_days)
        .bind(&best_times)
        .bind(profile.optimal_gap_hours)
        .bind(profile.channel_preference.to_string())
        .bind(profile.confidence)
        .bind(analyzed_at)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    async fn mark_analyzed(&self, id: LeadId, analyzed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE leads SET last_pattern_analysis = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(analyzed_at)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }
}
