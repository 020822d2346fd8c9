//! Engagement feed repositories - read-only inputs to the analyzer

use crate::db::DatabasePool;
use crate::models::{DemoView, EmailEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nurture_common::types::LeadId;
use nurture_common::{Error, Result};

/// Email open/reply event feed contract
#[async_trait]
pub trait EmailEventRepository: Send + Sync {
    async fn list_since(&self, lead_id: LeadId, since: DateTime<Utc>) -> Result<Vec<EmailEvent>>;
}

/// Demo view feed contract
#[async_trait]
pub trait DemoViewRepository: Send + Sync {
    async fn list_since(&self, lead_id: LeadId, since: DateTime<Utc>) -> Result<Vec<DemoView>>;
    async fn count_for_lead(&self, lead_id: LeadId) -> Result<i64>;
}

/// Database email event repository
pub struct DbEmailEventRepository {
    pool: DatabasePool,
}

impl DbEmailEventRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailEventRepository for DbEmailEventRepository {
    async fn list_since(&self, lead_id: LeadId, since: DateTime<Utc>) -> Result<Vec<EmailEvent>> {
        sqlx::query_as::<_, EmailEvent>(
            r#"
            SELECT * FROM email_events
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

/// Database demo view repository
pub struct DbDemoViewRepository {
    pool: DatabasePool,
}

impl DbDemoViewRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DemoViewRepository for DbDemoViewRepository {
    async fn list_since(&self, lead_id: LeadId, since: DateTime<Utc>) -> Result<Vec<DemoView>> {
        sqlx::query_as::<_, DemoView>(
            r#"
            SELECT * FROM demo_views
            WHERE lead_id = $1 AND viewed_at >= $2
            ORDER BY viewed_at ASC
            "#,
        )
        .bind(lead_id)
        .bind(since)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn count_for_lead(&self, lead_id: LeadId) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM demo_views WHERE lead_id = $1")
                .bind(lead_id)
                .fetch_one(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

        Ok(count.0)
    }
}
