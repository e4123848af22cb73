//! Deterministic demo fixtures for local development and smoke checks.

use chrono::{Duration, Utc};

use convoke_core::domain::channel::ChannelConfig;
use convoke_core::domain::event::{
    ChannelId, EventId, EventRecord, EventStatus, PostedMessage, UserId,
};
use convoke_core::domain::profile::{EventCategory, EventProfile};

use crate::repositories::{
    ChannelConfigStore, EventStore, ProfileStore, RepositoryError,
};

pub const DEMO_CHANNEL_ID: &str = "C-DEMO";
pub const DEMO_EVENT_ID: &str = "EVT-0000D0DE";
pub const DEMO_ADMIN_ID: &str = "U-DEMO-ADMIN";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedSummary {
    pub profiles: usize,
    pub channels: usize,
    pub events: usize,
}

/// Upserts a demo profile, channel configuration, and one upcoming event.
/// Safe to run repeatedly; every write is keyed on a fixed identifier.
pub async fn seed_demo(
    events: &dyn EventStore,
    channels: &dyn ChannelConfigStore,
    profiles: &dyn ProfileStore,
) -> Result<SeedSummary, RepositoryError> {
    let admin = UserId(DEMO_ADMIN_ID.to_string());
    let now = Utc::now();

    let profile = EventProfile {
        name: "Padel Match".to_string(),
        category: EventCategory::Participatory,
        capacity_unit: "courts".to_string(),
        seats_per_unit: 4,
        default_location: Some("Center Court".to_string()),
        venue_code: Some("1234".to_string()),
        default_capacity: 2,
        created_by: admin.clone(),
        created_at: now,
    };
    profiles.set(profile.clone()).await?;

    let channel = ChannelConfig {
        channel_id: ChannelId(DEMO_CHANNEL_ID.to_string()),
        default_event_type: profile.name.clone(),
        reaction_emoji: "hand".to_string(),
        display_emoji: "scroll".to_string(),
        reminder_template: None,
        configured_by: admin.clone(),
        configured_at: now,
    };
    channels.set(channel.clone()).await?;

    let booking = now + Duration::days(7);
    let event = EventRecord {
        id: EventId(DEMO_EVENT_ID.to_string()),
        title: "Padel Night".to_string(),
        event_type: profile.name.clone(),
        category: profile.category,
        location: "Center Court".to_string(),
        description: Some("A regularly scheduled engagement of Padel Match.".to_string()),
        venue_code: profile.venue_code.clone(),
        booking_date: booking.format("%A, %B %-d").to_string(),
        booking_time: "17:30".to_string(),
        booking_full_date: booking,
        rosters: profile.default_rosters(),
        standby: Vec::new(),
        created_at: now,
        created_by: admin,
        posted_messages: vec![PostedMessage {
            channel_id: channel.channel_id.clone(),
            message_ts: "1730000000.0001".to_string(),
        }],
        status: EventStatus::Active,
        post_at: None,
        scheduled_channel_id: None,
    };
    events.save(event).await?;

    Ok(SeedSummary { profiles: 1, channels: 1, events: 1 })
}

#[cfg(test)]
mod tests {
    use convoke_core::domain::event::{ChannelId, EventId, UserId};

    use crate::repositories::{
        ChannelConfigStore, EventStore, InMemoryChannelConfigStore, InMemoryEventStore,
        InMemoryProfileStore, ProfileStore,
    };

    use super::{seed_demo, DEMO_CHANNEL_ID, DEMO_EVENT_ID};

    #[tokio::test]
    async fn seed_is_idempotent_and_reachable_through_the_stores() {
        let events = InMemoryEventStore::default();
        let channels = InMemoryChannelConfigStore::default();
        let profiles = InMemoryProfileStore::default();

        let first = seed_demo(&events, &channels, &profiles).await.expect("seed");
        let second = seed_demo(&events, &channels, &profiles).await.expect("reseed");
        assert_eq!(first, second);

        let event = events
            .find_by_id(&EventId(DEMO_EVENT_ID.to_string()))
            .await
            .expect("find event")
            .expect("seeded event");
        assert_eq!(event.rosters.len(), 2);
        assert_eq!(event.max_capacity(), 8);
        assert!(!event.contains_user(&UserId("U-NOBODY".to_string())));

        assert!(channels
            .get(&ChannelId(DEMO_CHANNEL_ID.to_string()))
            .await
            .expect("get channel")
            .is_some());
        assert_eq!(profiles.list().await.expect("list").len(), 1);
    }
}
