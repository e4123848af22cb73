//! Contract test for the demo fixtures: everything the seed writes must be
//! reachable back through the SQL stores, and reseeding must not duplicate
//! or corrupt anything.

use chrono::Utc;

use convoke_core::domain::event::{ChannelId, EventId, UserId};
use convoke_db::repositories::{
    ChannelConfigStore, EventStore, ProfileStore, SqlChannelConfigStore, SqlEventStore,
    SqlProfileStore,
};
use convoke_db::{connect_with_settings, fixtures, migrations};

async fn seeded_stores() -> (SqlEventStore, SqlChannelConfigStore, SqlProfileStore) {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");

    let events = SqlEventStore::new(pool.clone());
    let channels = SqlChannelConfigStore::new(pool.clone());
    let profiles = SqlProfileStore::new(pool);

    fixtures::seed_demo(&events, &channels, &profiles).await.expect("seed");
    (events, channels, profiles)
}

#[tokio::test]
async fn seeded_event_is_reachable_by_id_message_ts_and_upcoming_listing() {
    let (events, _channels, _profiles) = seeded_stores().await;

    let by_id = events
        .find_by_id(&EventId(fixtures::DEMO_EVENT_ID.to_string()))
        .await
        .expect("query")
        .expect("seeded event present");
    assert_eq!(by_id.title, "Padel Night");
    assert_eq!(by_id.rosters.len(), 2);
    assert_eq!(by_id.max_capacity(), 8);
    assert_eq!(by_id.posted_messages.len(), 1);

    let by_ts = events
        .find_by_message_ts(&by_id.posted_messages[0].message_ts)
        .await
        .expect("query")
        .expect("ledger lookup resolves");
    assert_eq!(by_ts.id, by_id.id);

    let upcoming = events.find_upcoming(Utc::now()).await.expect("query");
    assert!(upcoming.iter().any(|event| event.id == by_id.id));
}

#[tokio::test]
async fn seeded_channel_and_profile_back_the_event_record() {
    let (_events, channels, profiles) = seeded_stores().await;

    let channel = channels
        .get(&ChannelId(fixtures::DEMO_CHANNEL_ID.to_string()))
        .await
        .expect("query")
        .expect("seeded channel present");
    assert_eq!(channel.default_event_type, "Padel Match");
    assert!(channel.is_admin(&UserId(fixtures::DEMO_ADMIN_ID.to_string())));

    let profile = profiles
        .get(&channel.default_event_type)
        .await
        .expect("query")
        .expect("seeded profile present");
    assert_eq!(profile.default_capacity, 2);
    assert_eq!(profile.seats_per_unit, 4);
    assert_eq!(profile.default_rosters().len(), 2);
}

#[tokio::test]
async fn reseeding_replaces_rather_than_duplicates() {
    let (events, channels, profiles) = seeded_stores().await;

    fixtures::seed_demo(&events, &channels, &profiles).await.expect("reseed");

    let upcoming = events.find_upcoming(Utc::now()).await.expect("query");
    assert_eq!(
        upcoming.iter().filter(|event| event.id.0 == fixtures::DEMO_EVENT_ID).count(),
        1,
        "reseeding must keep a single demo event"
    );
    assert_eq!(profiles.list().await.expect("query").len(), 1);
}
