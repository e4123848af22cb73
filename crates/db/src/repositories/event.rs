use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use convoke_core::domain::event::{EventId, EventRecord, EventStatus, UserId};

use super::{EventStore, RepositoryError};
use crate::DbPool;

pub struct SqlEventStore {
    pool: DbPool,
}

impl SqlEventStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn status_column(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Scheduled => "SCHEDULED",
        EventStatus::Active => "ACTIVE",
    }
}

fn decode_document(document: &str) -> Result<EventRecord, RepositoryError> {
    serde_json::from_str(document).map_err(|error| RepositoryError::Decode(error.to_string()))
}

#[async_trait]
impl EventStore for SqlEventStore {
    async fn find_by_id(&self, id: &EventId) -> Result<Option<EventRecord>, RepositoryError> {
        let row = sqlx::query("SELECT document FROM events WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| decode_document(&row.get::<String, _>("document"))).transpose()
    }

    async fn find_by_message_ts(
        &self,
        message_ts: &str,
    ) -> Result<Option<EventRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT events.document AS document
             FROM events, json_each(events.document, '$.posted_messages') AS posted
             WHERE json_extract(posted.value, '$.message_ts') = ?
             LIMIT 1",
        )
        .bind(message_ts)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| decode_document(&row.get::<String, _>("document"))).transpose()
    }

    async fn save(&self, event: EventRecord) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(&event)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO events (id, status, post_at, booking_full_date, document)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 status = excluded.status,
                 post_at = excluded.post_at,
                 booking_full_date = excluded.booking_full_date,
                 document = excluded.document",
        )
        .bind(&event.id.0)
        .bind(status_column(event.status))
        .bind(event.post_at.map(|instant| instant.to_rfc3339()))
        .bind(event.booking_full_date.to_rfc3339())
        .bind(document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &EventId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM events WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<EventRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT document FROM events
             WHERE status = 'SCHEDULED' AND post_at IS NOT NULL AND post_at <= ?
             ORDER BY post_at ASC",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| decode_document(&row.get::<String, _>("document"))).collect()
    }

    async fn find_upcoming(
        &self,
        on_or_after: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT document FROM events
             WHERE booking_full_date >= ?
             ORDER BY booking_full_date ASC",
        )
        .bind(on_or_after.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| decode_document(&row.get::<String, _>("document"))).collect()
    }

    async fn find_by_participant(
        &self,
        user: &UserId,
        on_or_after: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, RepositoryError> {
        // The document layout has no participant table to join against, so
        // the participant filter runs over the decoded upcoming set.
        let upcoming = self.find_upcoming(on_or_after).await?;
        Ok(upcoming.into_iter().filter(|event| event.contains_user(user)).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use convoke_core::domain::event::{
        ChannelId, EventId, EventRecord, EventStatus, Participant, PostedMessage, Roster, UserId,
    };
    use convoke_core::domain::profile::EventCategory;

    use crate::repositories::{EventStore, SqlEventStore};
    use crate::{connect_with_settings, migrations};

    async fn store() -> SqlEventStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlEventStore::new(pool)
    }

    fn record(id: &str, status: EventStatus, days_out: i64) -> EventRecord {
        let booking = Utc::now() + Duration::days(days_out);
        EventRecord {
            id: EventId(id.to_string()),
            title: "Padel Night".to_string(),
            event_type: "Padel Match".to_string(),
            category: EventCategory::Participatory,
            location: "Center Court".to_string(),
            description: None,
            venue_code: None,
            booking_date: "Friday, June 5th".to_string(),
            booking_time: "17:30".to_string(),
            booking_full_date: booking,
            rosters: vec![Roster::new("Court 1", 4, false)],
            standby: Vec::new(),
            created_at: Utc::now(),
            created_by: UserId("U-CREATOR".to_string()),
            posted_messages: Vec::new(),
            status,
            post_at: matches!(status, EventStatus::Scheduled)
                .then(|| Utc::now() - Duration::minutes(5)),
            scheduled_channel_id: Some(ChannelId("C1".to_string())),
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_the_full_document() {
        let store = store().await;
        let mut event = record("EVT-00000001", EventStatus::Active, 3);
        event.rosters[0].players.push(Participant::new(UserId("U1".to_string()), None, 1));

        store.save(event.clone()).await.expect("save");
        let found = store.find_by_id(&event.id).await.expect("find");

        assert_eq!(found, Some(event));
    }

    #[tokio::test]
    async fn save_is_a_full_document_replace() {
        let store = store().await;
        let mut event = record("EVT-00000002", EventStatus::Active, 3);
        store.save(event.clone()).await.expect("save");

        event.rosters[0].players.push(Participant::new(UserId("U1".to_string()), None, 0));
        store.save(event.clone()).await.expect("replace");

        let found = store.find_by_id(&event.id).await.expect("find").expect("present");
        assert_eq!(found.rosters[0].players.len(), 1);
    }

    #[tokio::test]
    async fn find_due_selects_only_scheduled_records_past_post_at() {
        let store = store().await;
        store.save(record("EVT-00000003", EventStatus::Scheduled, 7)).await.expect("save");
        store.save(record("EVT-00000004", EventStatus::Active, 7)).await.expect("save");

        let mut future = record("EVT-00000005", EventStatus::Scheduled, 7);
        future.post_at = Some(Utc::now() + chrono::Duration::hours(6));
        store.save(future).await.expect("save");

        let due = store.find_due(Utc::now()).await.expect("find due");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id.0, "EVT-00000003");
    }

    #[tokio::test]
    async fn find_upcoming_orders_by_booking_instant() {
        let store = store().await;
        store.save(record("EVT-00000006", EventStatus::Active, 9)).await.expect("save");
        store.save(record("EVT-00000007", EventStatus::Active, 2)).await.expect("save");
        store.save(record("EVT-00000008", EventStatus::Active, -2)).await.expect("save");

        let upcoming = store.find_upcoming(Utc::now()).await.expect("find upcoming");
        let ids: Vec<&str> = upcoming.iter().map(|event| event.id.0.as_str()).collect();
        assert_eq!(ids, ["EVT-00000007", "EVT-00000006"]);
    }

    #[tokio::test]
    async fn find_by_participant_matches_rosters_and_standby() {
        let store = store().await;

        let mut on_roster = record("EVT-00000009", EventStatus::Active, 4);
        on_roster.rosters[0].players.push(Participant::new(UserId("U1".to_string()), None, 0));
        store.save(on_roster).await.expect("save");

        let mut on_standby = record("EVT-0000000A", EventStatus::Active, 5);
        on_standby.standby.push(Participant::new(UserId("U1".to_string()), None, 0));
        store.save(on_standby).await.expect("save");

        store.save(record("EVT-0000000B", EventStatus::Active, 6)).await.expect("save");

        let mine =
            store.find_by_participant(&UserId("U1".to_string()), Utc::now()).await.expect("find");
        assert_eq!(mine.len(), 2);
    }

    #[tokio::test]
    async fn find_by_message_ts_resolves_through_the_ledger() {
        let store = store().await;
        let mut event = record("EVT-0000000C", EventStatus::Active, 3);
        event.posted_messages.push(PostedMessage {
            channel_id: ChannelId("C1".to_string()),
            message_ts: "1730000000.1234".to_string(),
        });
        store.save(event).await.expect("save");

        let found = store.find_by_message_ts("1730000000.1234").await.expect("find");
        assert_eq!(found.map(|event| event.id.0), Some("EVT-0000000C".to_string()));

        let missing = store.find_by_message_ts("1730000000.9999").await.expect("find");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let store = store().await;
        let event = record("EVT-0000000D", EventStatus::Active, 3);
        store.save(event.clone()).await.expect("save");

        assert!(store.delete(&event.id).await.expect("delete"));
        assert!(!store.delete(&event.id).await.expect("second delete"));
        assert!(store.find_by_id(&event.id).await.expect("find").is_none());
    }
}
