//! Task repository - creates reminders for human operators

use crate::db::DatabasePool;
use crate::models::CreateTask;
use async_trait::async_trait;
use nurture_common::types::TaskId;
use nurture_common::{Error, Result};
use uuid::Uuid;

/// Task store contract
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, input: CreateTask) -> Result<TaskId>;
}

/// Database task repository
pub struct DbTaskRepository {
    pool: DatabasePool,
}

impl DbTaskRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for DbTaskRepository {
    async fn create(&self, input: CreateTask) -> Result<TaskId> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO tasks (id, lead_id, title, description, due_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(input.lead_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.due_at)
        .bind(chrono::Utc::now())
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(id)
    }
}
