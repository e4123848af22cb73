use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use convoke_core::domain::calendar::CalendarTokens;
use convoke_core::domain::channel::ChannelConfig;
use convoke_core::domain::event::{ChannelId, EventId, EventRecord, UserId};
use convoke_core::domain::profile::EventProfile;

use super::{
    CalendarTokenStore, ChannelConfigStore, EventStore, ProfileStore, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<HashMap<String, EventRecord>>,
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn find_by_id(&self, id: &EventId) -> Result<Option<EventRecord>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events.get(&id.0).cloned())
    }

    async fn find_by_message_ts(
        &self,
        message_ts: &str,
    ) -> Result<Option<EventRecord>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .find(|event| {
                event.posted_messages.iter().any(|posted| posted.message_ts == message_ts)
            })
            .cloned())
    }

    async fn save(&self, event: EventRecord) -> Result<(), RepositoryError> {
        let mut events = self.events.write().await;
        events.insert(event.id.0.clone(), event);
        Ok(())
    }

    async fn delete(&self, id: &EventId) -> Result<bool, RepositoryError> {
        let mut events = self.events.write().await;
        Ok(events.remove(&id.0).is_some())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<EventRecord>, RepositoryError> {
        let events = self.events.read().await;
        let mut due: Vec<EventRecord> =
            events.values().filter(|event| event.is_due(now)).cloned().collect();
        due.sort_by_key(|event| event.post_at);
        Ok(due)
    }

    async fn find_upcoming(
        &self,
        on_or_after: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, RepositoryError> {
        let events = self.events.read().await;
        let mut upcoming: Vec<EventRecord> = events
            .values()
            .filter(|event| event.booking_full_date >= on_or_after)
            .cloned()
            .collect();
        upcoming.sort_by_key(|event| event.booking_full_date);
        Ok(upcoming)
    }

    async fn find_by_participant(
        &self,
        user: &UserId,
        on_or_after: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, RepositoryError> {
        let upcoming = self.find_upcoming(on_or_after).await?;
        Ok(upcoming.into_iter().filter(|event| event.contains_user(user)).collect())
    }
}

#[derive(Default)]
pub struct InMemoryChannelConfigStore {
    configs: RwLock<HashMap<String, ChannelConfig>>,
}

#[async_trait]
impl ChannelConfigStore for InMemoryChannelConfigStore {
    async fn get(&self, channel_id: &ChannelId) -> Result<Option<ChannelConfig>, RepositoryError> {
        let configs = self.configs.read().await;
        Ok(configs.get(&channel_id.0).cloned())
    }

    async fn set(&self, config: ChannelConfig) -> Result<(), RepositoryError> {
        let mut configs = self.configs.write().await;
        configs.insert(config.channel_id.0.clone(), config);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, EventProfile>>,
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, name: &str) -> Result<Option<EventProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(name).cloned())
    }

    async fn set(&self, profile: EventProfile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<EventProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        let mut all: Vec<EventProfile> = profiles.values().cloned().collect();
        all.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(all)
    }
}

#[derive(Default)]
pub struct InMemoryCalendarTokenStore {
    tokens: RwLock<HashMap<String, CalendarTokens>>,
}

#[async_trait]
impl CalendarTokenStore for InMemoryCalendarTokenStore {
    async fn get(&self, user: &UserId) -> Result<Option<CalendarTokens>, RepositoryError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(&user.0).cloned())
    }

    async fn set(&self, tokens: CalendarTokens) -> Result<(), RepositoryError> {
        let mut all = self.tokens.write().await;
        all.insert(tokens.user_id.0.clone(), tokens);
        Ok(())
    }
}
