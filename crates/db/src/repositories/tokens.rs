use async_trait::async_trait;
use sqlx::Row;

use convoke_core::domain::calendar::CalendarTokens;
use convoke_core::domain::event::UserId;

use super::{CalendarTokenStore, RepositoryError};
use crate::DbPool;

pub struct SqlCalendarTokenStore {
    pool: DbPool,
}

impl SqlCalendarTokenStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CalendarTokenStore for SqlCalendarTokenStore {
    async fn get(&self, user: &UserId) -> Result<Option<CalendarTokens>, RepositoryError> {
        let row = sqlx::query("SELECT document FROM calendar_tokens WHERE user_id = ?")
            .bind(&user.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            serde_json::from_str(&row.get::<String, _>("document"))
                .map_err(|error| RepositoryError::Decode(error.to_string()))
        })
        .transpose()
    }

    async fn set(&self, tokens: CalendarTokens) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(&tokens)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO calendar_tokens (user_id, document) VALUES (?, ?)
             ON CONFLICT (user_id) DO UPDATE SET document = excluded.document",
        )
        .bind(&tokens.user_id.0)
        .bind(document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
