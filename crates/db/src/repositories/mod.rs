use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use convoke_core::domain::calendar::CalendarTokens;
use convoke_core::domain::channel::ChannelConfig;
use convoke_core::domain::event::{ChannelId, EventId, EventRecord, UserId};
use convoke_core::domain::profile::EventProfile;

pub mod channel;
pub mod event;
pub mod memory;
pub mod profile;
pub mod tokens;

pub use channel::SqlChannelConfigStore;
pub use event::SqlEventStore;
pub use memory::{
    InMemoryCalendarTokenStore, InMemoryChannelConfigStore, InMemoryEventStore,
    InMemoryProfileStore,
};
pub use profile::SqlProfileStore;
pub use tokens::SqlCalendarTokenStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Transient store failure; surfaced to callers as "store unavailable".
    #[error("store unavailable: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Session store for event records: one JSON document per event, replaced
/// wholesale on save (last writer wins; callers serialize per event id).
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_by_id(&self, id: &EventId) -> Result<Option<EventRecord>, RepositoryError>;

    /// Look an event up from one of its posted announcement locations.
    async fn find_by_message_ts(
        &self,
        message_ts: &str,
    ) -> Result<Option<EventRecord>, RepositoryError>;

    async fn save(&self, event: EventRecord) -> Result<(), RepositoryError>;

    async fn delete(&self, id: &EventId) -> Result<bool, RepositoryError>;

    /// Records with `status = SCHEDULED` and `post_at <= now`. The status
    /// filter is what makes publication at-most-once.
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<EventRecord>, RepositoryError>;

    /// Upcoming events ordered by booking instant, earliest first.
    async fn find_upcoming(
        &self,
        on_or_after: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, RepositoryError>;

    /// Upcoming events the user appears in (roster or standby).
    async fn find_by_participant(
        &self,
        user: &UserId,
        on_or_after: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, RepositoryError>;
}

#[async_trait]
pub trait ChannelConfigStore: Send + Sync {
    async fn get(&self, channel_id: &ChannelId) -> Result<Option<ChannelConfig>, RepositoryError>;
    async fn set(&self, config: ChannelConfig) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<EventProfile>, RepositoryError>;
    async fn set(&self, profile: EventProfile) -> Result<(), RepositoryError>;
    /// All profiles, sorted by name.
    async fn list(&self) -> Result<Vec<EventProfile>, RepositoryError>;
}

#[async_trait]
pub trait CalendarTokenStore: Send + Sync {
    async fn get(&self, user: &UserId) -> Result<Option<CalendarTokens>, RepositoryError>;
    async fn set(&self, tokens: CalendarTokens) -> Result<(), RepositoryError>;
}
