//! Activity repository - the CRM activity timeline
//!
//! Doubles as the audit log (appends from the campaign worker) and as one of
//! the analyzer's engagement feeds (call/sms/email interaction records).

use crate::db::DatabasePool;
use crate::models::CrmActivity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nurture_common::types::LeadId;
use nurture_common::{Error, Result};
use uuid::Uuid;

/// Activity repository contract
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Append a human-readable record to a lead's timeline
    async fn append(&self, lead_id: LeadId, kind: &str, body: &str) -> Result<()>;
    async fn list_since(&self, lead_id: LeadId, since: DateTime<Utc>)
        -> Result<Vec<CrmActivity>>;
}

/// Database activity repository
pub struct DbActivityRepository {
    pool: DatabasePool,
}

impl DbActivityRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepository for DbActivityRepository {
    async fn append(&self, lead_id: LeadId, kind: &str, body: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activities (id, lead_id, kind, body, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(lead_id)
        .bind(kind)
        .bind(body)
        .bind(chrono::Utc::now())
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    async fn list_since(
        &self,
        lead_id: LeadId,
        since: DateTime<Utc>,
    ) -> Result<Vec<CrmActivity>> {
        sqlx::query_as::<_, CrmActivity>(
            r#"
            SELECT * FROM activities
            WHERE lead_id = $1 AND occurred_at >= $2
            ORDER BY occurred_at ASC
            "#,
        )
        .bind(lead_id)
        .bind(since)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
