use async_trait::async_trait;
use sqlx::Row;

use convoke_core::domain::channel::ChannelConfig;
use convoke_core::domain::event::ChannelId;

use super::{ChannelConfigStore, RepositoryError};
use crate::DbPool;

pub struct SqlChannelConfigStore {
    pool: DbPool,
}

impl SqlChannelConfigStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelConfigStore for SqlChannelConfigStore {
    async fn get(&self, channel_id: &ChannelId) -> Result<Option<ChannelConfig>, RepositoryError> {
        let row = sqlx::query("SELECT document FROM channel_configs WHERE channel_id = ?")
            .bind(&channel_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            serde_json::from_str(&row.get::<String, _>("document"))
                .map_err(|error| RepositoryError::Decode(error.to_string()))
        })
        .transpose()
    }

    async fn set(&self, config: ChannelConfig) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(&config)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO channel_configs (channel_id, document) VALUES (?, ?)
             ON CONFLICT (channel_id) DO UPDATE SET document = excluded.document",
        )
        .bind(&config.channel_id.0)
        .bind(document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
