//! Settings repository - global feature flags

use crate::db::DatabasePool;
use async_trait::async_trait;
use nurture_common::{Error, Result};

/// Settings store contract
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Read a boolean flag; `None` when the key is absent
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;
}

/// Database settings repository
pub struct DbSettingsRepository {
    pool: DatabasePool,
}

impl DbSettingsRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for DbSettingsRepository {
    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = $1")
                .bind(key)
                .fetch_optional(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.and_then(|(value,)| value.as_bool()))
    }
}
