use async_trait::async_trait;
use sqlx::Row;

use convoke_core::domain::profile::EventProfile;

use super::{ProfileStore, RepositoryError};
use crate::DbPool;

pub struct SqlProfileStore {
    pool: DbPool,
}

impl SqlProfileStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for SqlProfileStore {
    async fn get(&self, name: &str) -> Result<Option<EventProfile>, RepositoryError> {
        let row = sqlx::query("SELECT document FROM event_profiles WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            serde_json::from_str(&row.get::<String, _>("document"))
                .map_err(|error| RepositoryError::Decode(error.to_string()))
        })
        .transpose()
    }

    async fn set(&self, profile: EventProfile) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(&profile)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO event_profiles (name, document) VALUES (?, ?)
             ON CONFLICT (name) DO UPDATE SET document = excluded.document",
        )
        .bind(&profile.name)
        .bind(document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<EventProfile>, RepositoryError> {
        let rows = sqlx::query("SELECT document FROM event_profiles ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                serde_json::from_str(&row.get::<String, _>("document"))
                    .map_err(|error| RepositoryError::Decode(error.to_string()))
            })
            .collect()
    }
}
